//! # voicegate-core
//!
//! Core types, configuration, and utilities for Voicegate.
//!
//! This crate provides shared functionality used across all Voicegate crates:
//!
//! - **Configuration**: Loading, validation, and env overrides for the config file
//! - **Types**: Tool definitions and the collaborator traits the proxy consumes
//! - **Utilities**: Path resolution, environment handling, secret strings

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, Error, Result, ToolError};
pub use secret::SecretString;
pub use types::*;
