use clap::Parser;
use tracing_subscriber::EnvFilter;

use rollout::cli::Cli;
use rollout::cmd::{cmd_completions, run, Commands};
use rollout::db::Database;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions don't need a database
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    let db_path = cli.db_path();
    let mut db = match Database::load(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &mut db, &db_path, cli.cost_model) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
