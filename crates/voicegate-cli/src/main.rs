//! Voicegate CLI entry point.

use clap::Parser;
use voicegate_cli::{logging, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    logging::init(cli.verbose, cli.config.as_deref());

    // Run the command
    run(cli).await
}
