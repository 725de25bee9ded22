mod assets;
mod config;
mod identity;
mod models;
mod normalizer;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Importer;

#[derive(Parser)]
#[command(
    name = "catalog-import",
    about = "Import Made-in-China listings into the carbon parts catalog",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape, mirror images and upsert into the products table (default)
    Import,

    /// Scrape and print the records an import would write, as JSON
    Preview,

    /// Print the resolved configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "catalog_import=info,warn",
        1 => "catalog_import=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Import) {
        Command::Import => {
            let _t = utils::Timer::start("import");
            let stats = Importer::from_config(config).await?.run().await?;
            info!(
                "Done: {} pages, {} items, {} written, {} given up",
                stats.pages, stats.items_scraped, stats.records_written, stats.records_given_up
            );
        }

        Command::Preview => {
            let records = Importer::from_config(config).await?.preview().await?;
            let json = serde_json::to_string_pretty(&records).context("serialize preview")?;
            println!("{}", json);
            info!("{} records previewed", records.len());
        }

        Command::Config => {
            let json = serde_json::to_string_pretty(&config).context("serialize config")?;
            println!("{}", json);
        }
    }

    Ok(())
}
