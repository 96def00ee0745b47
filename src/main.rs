mod batch;
mod cli;
mod commands;
mod writer;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Zoning(args) => {
            commands::run_zoning(args)?;
        }
        Commands::Flood(args) => {
            commands::run_flood(args)?;
        }
        Commands::Stations(args) => {
            commands::run_stations(args)?;
        }
        Commands::FindStation(args) => {
            commands::run_find_station(args)?;
        }
        Commands::Enrich(args) => {
            commands::run_enrich(args)?;
        }
        Commands::Batch(args) => {
            batch::run_batch(args)?;
        }
    }

    Ok(())
}
