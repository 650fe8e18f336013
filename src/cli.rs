use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use promptlane::config::{load_config, CliOverrides};
use promptlane::gateway;

#[derive(Parser)]
#[command(name = "promptlane")]
#[command(about = "promptlane - serial inference chat gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway daemon
    Serve {
        /// Path to the configuration file (default: ~/.promptlane/config.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Engine base URL override
        #[arg(long)]
        engine_url: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },
    /// Display version information
    Version,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve {
            config,
            engine_url,
            model,
        }) => {
            let overrides = CliOverrides {
                config_path: config,
                engine_url,
                model,
            };
            let config = load_config(overrides)?;

            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to start async runtime")?;
            runtime.block_on(gateway::run_gateway(&config))
        }
        Some(Commands::Version) => {
            println!("promptlane {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            // No subcommand: print help and exit cleanly
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    }
}
