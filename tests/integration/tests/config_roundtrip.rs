//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back, and that the loaded config drives the tool catalogue.

use std::path::Path;
use tempfile::TempDir;
use voicegate_core::config::{BindMode, Config, WebhookToolConfig};
use voicegate_core::{SecretString, ToolCatalogue};
use voicegate_tools::ToolRegistry;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicegate.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.gateway.port, config.gateway.port);
    assert_eq!(loaded.gateway.bind, config.gateway.bind);
    assert_eq!(loaded.gateway.path, config.gateway.path);
    assert_eq!(loaded.upstream.connect_attempts, 3);
    assert_eq!(loaded.upstream.retry_delay_ms, 2000);
    assert_eq!(loaded.tools.timeout_secs, 30);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicegate.json5");

    let mut config = Config::default();
    config.gateway.port = 9090;
    config.gateway.bind = BindMode::Lan;
    config.gateway.auth_token = Some(SecretString::new("gateway-token"));
    config.upstream.base_url = Some("wss://agent.example.com".to_string());
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.gateway.port, 9090);
    assert_eq!(loaded.gateway.bind, BindMode::Lan);
    assert!(loaded.gateway.auth_token.as_ref().unwrap().matches("gateway-token"));
    assert_eq!(loaded.upstream.base_url.as_deref(), Some("wss://agent.example.com"));
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/voicegate.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json5 {");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_json5_config_builds_catalogue() {
    let config = Config::parse(
        r#"{
            // Knowledge sources exposed to the voice agent
            tools: {
                clock: false,
                webhooks: [
                    {
                        name: "search_algolia",
                        description: "Search the documentation index",
                        url: "https://search.example.com/query",
                        parameters: { type: "object", properties: { query: { type: "string" } } },
                    },
                ],
            },
        }"#,
    )
    .unwrap();
    assert!(config.validate().is_ok());

    let registry = ToolRegistry::from_config(&config.tools).unwrap();
    let definitions = registry.tool_definitions().await;
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].name, "search_algolia");
    assert_eq!(definitions[0].parameters["properties"]["query"]["type"], "string");
}

#[test]
fn test_webhook_entries_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicegate.json5");

    let mut config = Config::default();
    config.tools.webhooks.push(WebhookToolConfig {
        name: "kb".to_string(),
        description: "Knowledge base".to_string(),
        parameters: serde_json::json!({"type": "object"}),
        url: "https://kb.example.com/search".to_string(),
        api_key: Some(SecretString::new("kb-key")),
        headers: Default::default(),
        timeout_secs: 7,
    });
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.tools.webhooks.len(), 1);
    assert_eq!(loaded.tools.webhooks[0].timeout_secs, 7);
    assert!(loaded.tools.webhooks[0].api_key.as_ref().unwrap().matches("kb-key"));
}
