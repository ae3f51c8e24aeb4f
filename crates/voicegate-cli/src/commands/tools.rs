//! Tool catalogue commands.

use clap::Args;
use std::path::Path;
use voicegate_core::ToolCatalogue;
use voicegate_tools::ToolRegistry;

/// Tools command arguments.
#[derive(Args)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommand,
}

#[derive(clap::Subcommand)]
pub enum ToolsCommand {
    /// List the tools injected into client settings
    List {
        /// Print the definitions as JSON, exactly as sent upstream
        #[arg(long)]
        json: bool,
    },
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let registry = ToolRegistry::from_config(&config.tools)?;

    match args.command {
        ToolsCommand::List { json } => {
            let definitions = registry.tool_definitions().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&definitions)?);
            } else if definitions.is_empty() {
                println!("No tools configured");
            } else {
                for definition in definitions {
                    println!("{:<24} {}", definition.name, definition.description);
                }
            }
        }
    }

    Ok(())
}
