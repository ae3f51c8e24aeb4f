//! CLI command implementations.

pub mod config;
pub mod serve;
pub mod tools;

use std::path::Path;
use voicegate_core::config::Config;

/// Load the config file (or defaults) and apply environment overrides.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.apply_env_overrides();
    Ok(config)
}
