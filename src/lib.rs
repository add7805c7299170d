//! # Rollout - release planning for independent artists
//!
//! Deadlines derive from release dates: every song, version, video, release
//! and event carries a set of production tasks whose dates sit a fixed number
//! of days before the owner's reference date. Move the release date and the
//! plan moves with it, except for tasks the user pinned by hand or finished.
//!
//! ## Engine
//!
//! - [`cost`]: layered costs (estimated, quoted, partially paid, paid,
//!   actual) resolved to one effective amount under a selectable model.
//! - [`offsets`] and [`catalog`]: which tasks exist for a category and
//!   subtype, and how many days before the reference date each falls.
//! - [`schedule`]: deadline generation and lock-aware recalculation.
//! - [`propagate`]: era, stage and tag inheritance down the song graph.
//! - [`rollup`]: min / max / committed totals over a forest of costed
//!   items with optional work and mutually exclusive alternatives.
//!
//! All engine functions are pure and total: malformed input degrades to
//! zero costs, default offsets or an unchanged task list.
//!
//! ## Storage and CLI
//!
//! [`db::Database`] is one JSON file (default `~/.rollout/rollout.json`).
//! The `rollout` binary wraps it with clap subcommands:
//!
//! ```bash
//! rollout song add "Nightdrive" --date 2024-06-01 --tag synthwave
//! rollout list --due this-week
//! rollout task date nightdrive:mix 2024-04-10
//! rollout song date nightdrive 2024-07-01
//! rollout rollup --cost-model quoted-first
//! ```

pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod cost;
pub mod db;
pub mod entities;
pub mod error;
pub mod fields;
pub mod offsets;
pub mod propagate;
pub mod rollup;
pub mod schedule;
pub mod settings;
pub mod task;

pub use error::{Error, Result};
