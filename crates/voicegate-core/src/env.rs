//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a u16 (e.g., for ports).
pub fn get_u16(name: &str) -> Option<u16> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Environment variable names understood by Voicegate.
pub mod vars {
    /// Base directory override.
    pub const VOICEGATE_HOME: &str = "VOICEGATE_HOME";

    /// Config file override.
    pub const VOICEGATE_CONFIG: &str = "VOICEGATE_CONFIG";

    /// Upstream agent base URL.
    pub const VOICEGATE_UPSTREAM_URL: &str = "VOICEGATE_UPSTREAM_URL";

    /// Upstream agent API key.
    pub const VOICEGATE_UPSTREAM_API_KEY: &str = "VOICEGATE_UPSTREAM_API_KEY";

    /// Bearer token clients must present to the gateway.
    pub const VOICEGATE_AUTH_TOKEN: &str = "VOICEGATE_AUTH_TOKEN";

    /// Gateway port override.
    pub const VOICEGATE_PORT: &str = "VOICEGATE_PORT";

    /// Log output format (`pretty` or `json`).
    pub const VOICEGATE_LOG_FORMAT: &str = "VOICEGATE_LOG_FORMAT";

    /// Force JSON log output.
    pub const VOICEGATE_LOG_JSON: &str = "VOICEGATE_LOG_JSON";
}
