//! Headcount CLI - crowd-level estimation from single photographs.
//!
//! Headcount asks several image-analysis backends how many people a photo
//! shows, combines their answers into one count and a crowd-level tier, and
//! merges the result into the subject's record.
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP ingest server
//! headcount serve --port 7860
//!
//! # Estimate a single local image
//! headcount estimate bus.jpg --pretty
//!
//! # View configuration
//! headcount config show
//! ```

use clap::{Parser, Subcommand};
use headcount_core::Config;
use std::path::PathBuf;

mod cli;
mod logging;
mod server;

/// Headcount - crowd-level estimation from single photographs.
#[derive(Parser, Debug)]
#[command(name = "headcount")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "HEADCOUNT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP ingest server
    Serve(cli::serve::ServeArgs),

    /// Estimate the crowd in a local image and print the result as JSON
    Estimate(cli::estimate::EstimateArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `headcount config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Headcount v{}", headcount_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Estimate(args) => cli::estimate::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
