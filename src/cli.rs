use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::fields::CostModel;

/// File-backed release planner for independent artists.
/// Storage defaults to ~/.rollout/rollout.json, ROLLOUT_DB or a path passed via --db.
#[derive(Parser)]
#[command(name = "rollout", version, about = "Plan song, video and release rollouts")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, global = true, env = "ROLLOUT_DB")]
    pub db: Option<PathBuf>,

    /// Cost model for this run, overriding the stored setting.
    #[arg(long, global = true, value_enum)]
    pub cost_model: Option<CostModel>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(default_db_path)
    }
}

/// `~/.rollout/rollout.json`, or `./.rollout/rollout.json` without a home directory.
pub fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".rollout").join("rollout.json")
}
