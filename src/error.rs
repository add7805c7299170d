//! Error types for the database and command surfaces.
//!
//! The scheduling and costing engine never fails; these errors only come from
//! loading/saving the database file, looking up entities and validating
//! command-line input.

use thiserror::Error;

/// Result type used by the non-engine parts of the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing the database file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The database file is not valid JSON for the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No entity or task with the given identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed user input (dates, offsets, source names).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Attempted to delete the core version of a song.
    #[error("The core version of song '{0}' cannot be deleted")]
    CoreVersion(String),
}
