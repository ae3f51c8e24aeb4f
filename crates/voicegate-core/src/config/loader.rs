//! Configuration loading, env overrides, and persistence.

use super::{BindMode, Config, LogFormat};
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::paths;
use crate::secret::SecretString;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load from `path` when given, otherwise from the default location,
    /// falling back to defaults when the default file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::load_default() {
                Err(ConfigError::NotFound(path)) => {
                    debug!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
                other => other,
            },
        }
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Apply `VOICEGATE_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env::get_var(vars::VOICEGATE_UPSTREAM_URL) {
            self.upstream.base_url = Some(url);
        }
        if let Some(key) = env::get_var(vars::VOICEGATE_UPSTREAM_API_KEY) {
            self.upstream.api_key = Some(SecretString::new(key));
        }
        if let Some(token) = env::get_var(vars::VOICEGATE_AUTH_TOKEN) {
            self.gateway.auth_token = Some(SecretString::new(token));
        }
        if let Some(port) = env::get_u16(vars::VOICEGATE_PORT) {
            self.gateway.port = port;
        }
        if env::get_bool(vars::VOICEGATE_LOG_JSON)
            || env::get_var(vars::VOICEGATE_LOG_FORMAT).as_deref() == Some("json")
        {
            self.logging.format = LogFormat::Json;
        }
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; JSON is valid JSON5
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Gateway
        if self.gateway.port == 0 {
            errors.push("Gateway port cannot be 0".to_string());
        }
        if !self.gateway.path.starts_with('/') {
            errors.push(format!(
                "Gateway path '{}' must start with '/'",
                self.gateway.path
            ));
        }
        if self.gateway.max_connections == 0 {
            errors.push("Gateway max_connections must be at least 1".to_string());
        }
        if self.gateway.bind != BindMode::Loopback
            && self.gateway.auth_token.as_ref().map_or(true, |t| t.is_empty())
        {
            errors.push("Non-loopback bind requires gateway.auth_token".to_string());
        }

        // 2. Upstream
        if self.upstream.connect_attempts == 0 {
            errors.push("Upstream connect_attempts must be at least 1".to_string());
        }
        if let Some(base_url) = &self.upstream.base_url {
            match url::Url::parse(base_url) {
                Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
                Ok(url) => errors.push(format!(
                    "Upstream base_url must use ws:// or wss://, got '{}'",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("Invalid upstream base_url '{}': {}", base_url, e)),
            }
        }

        // 3. Webhook tools
        let mut names = HashSet::new();
        for hook in &self.tools.webhooks {
            if hook.name.trim().is_empty() {
                errors.push("Webhook tool with empty name".to_string());
            } else if !names.insert(hook.name.as_str()) {
                errors.push(format!("Duplicate tool name '{}'", hook.name));
            }
            match url::Url::parse(&hook.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => errors.push(format!(
                    "Tool '{}': url '{}' must be an http(s) URL",
                    hook.name, hook.url
                )),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookToolConfig;

    fn webhook(name: &str, url: &str) -> WebhookToolConfig {
        WebhookToolConfig {
            name: name.to_string(),
            description: "test".to_string(),
            parameters: serde_json::json!({}),
            url: url.to_string(),
            api_key: None,
            headers: Default::default(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_parse_json5() {
        let config = Config::parse(
            r#"{
                // comments are allowed
                gateway: { port: 9000 },
                upstream: { base_url: "wss://agent.example.com", api_key: "k" },
                tools: { timeout_secs: 10, webhooks: [] },
            }"#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.upstream.base_url.as_deref(), Some("wss://agent.example.com"));
        assert_eq!(config.upstream.path, "/v1/agent/converse");
        assert_eq!(config.tools.timeout_secs, 10);
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.gateway.port = 0;
        config.upstream.connect_attempts = 0;
        config.upstream.base_url = Some("https://agent.example.com".to_string());
        config.tools.webhooks = vec![
            webhook("search", "https://search.example.com"),
            webhook("search", "ftp://search.example.com"),
        ];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("port cannot be 0"));
        assert!(err.contains("connect_attempts"));
        assert!(err.contains("ws:// or wss://"));
        assert!(err.contains("Duplicate tool name 'search'"));
        assert!(err.contains("http(s) URL"));
    }

    #[test]
    fn test_validate_lan_requires_token() {
        let mut config = Config::default();
        config.gateway.bind = BindMode::Lan;
        assert!(config.validate().is_err());

        config.gateway.auth_token = Some(SecretString::new("t0ken"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/voicegate.json5"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
