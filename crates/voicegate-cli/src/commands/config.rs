//! Configuration management commands.

use clap::Args;
use std::path::{Path, PathBuf};
use voicegate_core::config::Config;
use voicegate_core::paths;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Validate configuration
    Check,

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
        }

        ConfigCommand::Check => {
            let config = super::load_config(config_path)?;
            match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("{}", e),
            }
        }

        ConfigCommand::Init { force } => {
            let path = resolve_path(config_path)?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            Config::default().save(&path)?;
            println!("Created config file: {}", path.display());
        }

        ConfigCommand::Path => {
            println!("{}", resolve_path(config_path)?.display());
        }
    }

    Ok(())
}

fn resolve_path(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// JSON view of the config with every secret replaced.
fn redacted(config: &Config) -> anyhow::Result<serde_json::Value> {
    let mut json = serde_json::to_value(config)?;
    let mask = |value: &mut serde_json::Value| {
        if value.is_string() {
            *value = serde_json::Value::String("[REDACTED]".to_string());
        }
    };

    if let Some(token) = json.pointer_mut("/gateway/auth_token") {
        mask(token);
    }
    if let Some(key) = json.pointer_mut("/upstream/api_key") {
        mask(key);
    }
    if let Some(hooks) = json.pointer_mut("/tools/webhooks").and_then(|v| v.as_array_mut()) {
        for hook in hooks {
            if let Some(key) = hook.get_mut("api_key") {
                mask(key);
            }
        }
    }
    Ok(json)
}
