use anyhow::Result;
use clap::Parser;

use tangle::cli::{Cli, Commands};
use tangle::{commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    logging::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Render(args) => commands::render::run(args).await,
        Commands::Cache(args) => commands::cache::cache(&args).await,
    }
}
