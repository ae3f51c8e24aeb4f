//! Voicegate command-line interface.

pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};

/// Voicegate - voice agent gateway with server-side tool calling
#[derive(Parser)]
#[command(name = "voicegate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "VOICEGATE_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve(commands::serve::ServeArgs),

    /// Inspect the tool catalogue
    Tools(commands::tools::ToolsArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config_path).await,
        Commands::Tools(args) => commands::tools::run(args, config_path).await,
        Commands::Config(args) => commands::config::run(args, config_path).await,
        Commands::Version => {
            println!("voicegate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use voicegate_core::config::BindMode;

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["voicegate", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "voicegate",
            "serve",
            "--bind",
            "lan",
            "--port",
            "9000",
            "--auth-token",
            "secret",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, Some(BindMode::Lan));
                assert_eq!(args.port, Some(9000));
                assert_eq!(args.auth_token.as_deref(), Some("secret"));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_serve_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["voicegate", "serve", "--bind", "tailnet"]).is_err());
    }

    #[test]
    fn test_parse_config_init_force() {
        let cli = Cli::try_parse_from(["voicegate", "config", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(
                    args.command,
                    commands::config::ConfigCommand::Init { force: true }
                ));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_parse_tools_list() {
        let cli = Cli::try_parse_from(["voicegate", "-vv", "tools", "list", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Tools(args) => {
                assert!(matches!(
                    args.command,
                    commands::tools::ToolsCommand::List { json: true }
                ));
            }
            _ => panic!("Expected Tools command"),
        }
    }

    #[test]
    fn test_parse_global_config_path() {
        let cli =
            Cli::try_parse_from(["voicegate", "--config", "/tmp/vg.json5", "config", "check"])
                .unwrap();
        assert_eq!(cli.config, Some(std::path::PathBuf::from("/tmp/vg.json5")));
    }
}
