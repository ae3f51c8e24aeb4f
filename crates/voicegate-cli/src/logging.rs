//! Tracing subscriber setup.

use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voicegate_core::config::{Config, LogFormat, LogLevel};

/// Crates whose events the default filter lets through.
const CRATES: &[&str] = &[
    "voicegate_cli",
    "voicegate_core",
    "voicegate_gateway",
    "voicegate_proxy",
    "voicegate_tools",
    "tower_http",
];

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level comes from `-v` flags or the
/// config file. Config problems are reported later by the command itself.
pub fn init(verbose: u8, config_path: Option<&Path>) {
    let mut logging = Config::load_or_default(config_path)
        .map(|mut config| {
            config.apply_env_overrides();
            config.logging
        })
        .unwrap_or_default();
    if verbose > 0 {
        logging.level = verbosity_level(verbose);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn verbosity_level(verbose: u8) -> LogLevel {
    match verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

/// Filter directive applying `level` to the workspace crates and `warn` elsewhere.
fn default_directive(level: LogLevel) -> String {
    let mut directive = String::from("warn");
    for krate in CRATES {
        directive.push_str(&format!(",{}={}", krate, level.as_str()));
    }
    directive
}
