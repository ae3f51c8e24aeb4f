//! Webhook-backed knowledge source tool.

use crate::Tool;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use voicegate_core::config::WebhookToolConfig;
use voicegate_core::{SecretString, ToolDefinition, ToolError};

/// Tool that POSTs its arguments as JSON to a configured endpoint and
/// returns the response body as the tool output.
pub struct WebhookTool {
    definition: ToolDefinition,
    url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookTool {
    /// Create a webhook tool from its config entry.
    pub fn new(config: &WebhookToolConfig) -> Result<Self, ToolError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ToolError::InvalidInput(format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ToolError::InvalidInput(format!("header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ToolError::Http(e.to_string()))?;

        Ok(Self {
            definition: ToolDefinition::new(&config.name, &config.description)
                .with_parameters(config.parameters.clone()),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout,
            client,
        })
    }
}

#[async_trait]
impl Tool for WebhookTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let start = Instant::now();

        let mut request = self.client.post(&self.url).json(&args);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                ToolError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;
        debug!(
            "Webhook {} answered {} in {}ms",
            self.definition.name,
            status,
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "{} returned {}: {}",
                self.definition.name,
                status,
                body.trim()
            )));
        }

        Ok(extract_output(body))
    }
}

/// Unwrap JSON string bodies and `{"result": ...}` envelopes; anything else
/// is returned as-is.
fn extract_output(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::String(text)) => text,
        Ok(Value::Object(mut object)) => match object.remove("result") {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => body,
        },
        _ => body,
    }
}
