//! pmoreorder : réordonne une playlist distante avec un minimum de déplacements

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use pmoconfig::Config;
use std::path::PathBuf;
use std::process::ExitCode;

/// Reorder a remote playlist with the fewest single-item moves
#[derive(Parser)]
#[command(name = "pmoreorder", version)]
#[command(about = "Plans and applies minimal move sequences on a remote playlist")]
pub struct Cli {
    /// Configuration directory (defaults to $PMOREORDER_CONFIG or .pmoreorder)
    #[arg(long, global = true)]
    pub config_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch the current order from YouTube and store it as the snapshot
    Fetch {
        #[arg(long)]
        playlist: String,
    },

    /// Store a snapshot read from a JSON file
    Import {
        /// JSON snapshot file
        #[arg(long)]
        file: PathBuf,

        /// Playlist id (defaults to the one recorded in the file)
        #[arg(long)]
        playlist: Option<String>,
    },

    /// Print or write the stored snapshot as JSON
    Export {
        #[arg(long)]
        playlist: String,

        /// Output file (stdout if absent)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the move plan without applying it
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Apply the move plan (dry-run unless --live)
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Call the remote service and persist progress after every move
        #[arg(long)]
        live: bool,

        /// Refresh the snapshot from YouTube before planning
        #[arg(long, requires = "live")]
        refresh: bool,

        /// Print the execution result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
pub struct TargetArgs {
    #[arg(long)]
    pub playlist: String,

    /// JSON array of ids in the desired order (timestamp order if absent)
    #[arg(long)]
    pub desired: Option<PathBuf>,

    /// Planning strategy (skeleton, naive)
    #[arg(long)]
    pub strategy: Option<String>,
}

/// Issue d'une commande
pub enum Outcome {
    Completed,
    Halted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_config(cli.config_dir.as_deref().unwrap_or("")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&config, cli.log_level.as_deref());

    match commands::run(&config, cli.command).await {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Halted) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
