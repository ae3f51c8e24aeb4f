//! Discriminator sniffing and the upstream message shapes the relay decodes.
//!
//! Frames are inspected in two steps: [`sniff_type`] reads only the `type`
//! field, and the processor that claims that type decodes the full shape.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use voicegate_core::ToolDefinition;

/// Discriminator values the relay knows about.
pub mod message_types {
    /// Upstream asks the client side to run a function.
    pub const FUNCTION_CALL_REQUEST: &str = "FunctionCallRequest";
    /// Reply to a function call.
    pub const FUNCTION_CALL_RESPONSE: &str = "FunctionCallResponse";
    /// Client session settings.
    pub const SETTINGS: &str = "Settings";
    /// Legacy name of the settings message.
    pub const SETTINGS_CONFIGURATION: &str = "SettingsConfiguration";
}

#[derive(Deserialize)]
struct Discriminator {
    #[serde(rename = "type")]
    message_type: Option<String>,
}

/// Extract the `type` discriminator of a JSON text payload.
///
/// Returns `None` for anything that is not a JSON object with a string
/// `type` field; such frames are never claimed.
pub fn sniff_type(payload: &[u8]) -> Option<String> {
    serde_json::from_slice::<Discriminator>(payload)
        .ok()
        .and_then(|d| d.message_type)
}

/// A function the upstream agent wants executed.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCallRequest {
    /// Function to run.
    pub function_name: String,

    /// Identifier echoed back in the response.
    #[serde(alias = "function_call_id")]
    pub correlation_id: String,

    /// Opaque arguments.
    #[serde(default)]
    pub input: Value,
}

/// The locally computed result of a function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallResponse {
    #[serde(rename = "type")]
    pub message_type: String,

    /// Identifier of the request being answered.
    pub correlation_id: String,

    /// Tool output as text.
    pub output: String,
}

impl FunctionCallResponse {
    /// Build a response for the given request id.
    pub fn new(correlation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            message_type: message_types::FUNCTION_CALL_RESPONSE.to_string(),
            correlation_id: correlation_id.into(),
            output: output.into(),
        }
    }

    /// Encode as a text frame payload.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Client settings message; only `agent.think.functions` is interpreted,
/// everything else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsMessage {
    pub agent: AgentSettings,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// The `agent` block of a settings message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub think: ThinkSettings,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// The `agent.think` block of a settings message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkSettings {
    /// Whatever the client sent; replaced before forwarding.
    #[serde(default)]
    pub functions: Vec<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SettingsMessage {
    /// Replace the advertised functions wholesale.
    pub fn replace_functions(&mut self, functions: &[ToolDefinition]) -> serde_json::Result<()> {
        self.agent.think.functions = functions
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<_>>()?;
        Ok(())
    }

    /// Encode as a text frame payload.
    pub fn to_payload(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_type() {
        assert_eq!(
            sniff_type(br#"{"type":"Settings","audio":{}}"#).as_deref(),
            Some("Settings")
        );
        assert_eq!(
            sniff_type(br#"{"role":"user","type":"ConversationText"}"#).as_deref(),
            Some("ConversationText")
        );
    }

    #[test]
    fn test_sniff_type_rejects_non_envelopes() {
        assert!(sniff_type(b"not json").is_none());
        assert!(sniff_type(b"[1,2,3]").is_none());
        assert!(sniff_type(br#"{"kind":"Settings"}"#).is_none());
        assert!(sniff_type(br#"{"type":42}"#).is_none());
    }

    #[test]
    fn test_function_call_request_alias() {
        let request: FunctionCallRequest = serde_json::from_str(
            r#"{"type":"FunctionCallRequest","function_name":"lookup","function_call_id":"fc-1","input":{"q":"x"}}"#,
        )
        .unwrap();
        assert_eq!(request.correlation_id, "fc-1");
        assert_eq!(request.input["q"], "x");
    }

    #[test]
    fn test_function_call_response_shape() {
        let payload = FunctionCallResponse::new("abc", "result-text").to_payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "FunctionCallResponse",
                "correlation_id": "abc",
                "output": "result-text"
            })
        );
    }

    #[test]
    fn test_settings_preserves_unknown_fields() {
        let mut settings: SettingsMessage = serde_json::from_str(
            r#"{
                "type": "Settings",
                "audio": {"input": {"encoding": "linear16", "sample_rate": 16000}},
                "agent": {
                    "listen": {"model": "nova-2"},
                    "think": {"provider": {"type": "open_ai"}, "instructions": "be brief", "functions": [{"name": "client_fn", "endpoint": {"url": "https://x"}}]}
                }
            }"#,
        )
        .unwrap();

        settings
            .replace_functions(&[ToolDefinition::new("search_algolia", "Search")])
            .unwrap();
        let value: Value = serde_json::from_slice(&settings.to_payload().unwrap()).unwrap();

        assert_eq!(value["type"], "Settings");
        assert_eq!(value["audio"]["input"]["sample_rate"], 16000);
        assert_eq!(value["agent"]["listen"]["model"], "nova-2");
        assert_eq!(value["agent"]["think"]["instructions"], "be brief");
        assert_eq!(value["agent"]["think"]["functions"][0]["name"], "search_algolia");
        assert_eq!(value["agent"]["think"]["functions"].as_array().unwrap().len(), 1);
    }
}
