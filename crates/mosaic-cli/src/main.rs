//! Mosaic CLI: entry point.
//!
//! # Commands
//!
//! - `mosaic init`: write a default config file
//! - `mosaic status`: show configuration and provider status
//! - `mosaic complete -p PROVIDER -m MESSAGE`: one structured completion,
//!   printed with its audit record

mod complete;
mod helpers;
mod init;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Mosaic: structured LLM completions with traced HTTP audit
#[derive(Parser)]
#[command(name = "mosaic", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.mosaic/config.json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file if none exists
    Init,

    /// Show configuration and provider status
    Status,

    /// Run one structured completion and print it with its audit record
    Complete(complete::CompleteArgs),
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path: Option<PathBuf> = cli.config.as_deref().map(helpers::expand_tilde);

    match cli.command {
        Commands::Init => init::run(config_path.as_deref()),
        Commands::Status => status::run(config_path.as_deref()),
        Commands::Complete(args) => {
            init_logging(args.logs);
            complete::run(config_path.as_deref(), args).await
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mosaic=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
