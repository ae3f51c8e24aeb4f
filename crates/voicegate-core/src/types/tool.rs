//! Tool-related types and the collaborator traits the proxy engine consumes.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Definition of a tool advertised to the upstream agent.
///
/// Serializes to the function shape the agent expects inside
/// `agent.think.functions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,

    /// Human-readable description the agent uses to decide when to call it.
    pub description: String,

    /// JSON Schema for the call arguments.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a definition with an empty object schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_object_schema(),
        }
    }

    /// Set the parameter schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Read access to the tool definitions the gateway advertises upstream.
#[async_trait]
pub trait ToolCatalogue: Send + Sync {
    /// Current list of tool definitions.
    async fn tool_definitions(&self) -> Vec<ToolDefinition>;
}

/// Executes a named tool on behalf of the upstream agent.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `name` with the raw JSON argument payload and return plain text.
    async fn execute_tool_call(&self, name: &str, args: &[u8]) -> Result<String, ToolError>;
}

#[async_trait]
impl<T: ToolCatalogue + ?Sized> ToolCatalogue for Arc<T> {
    async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        (**self).tool_definitions().await
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute_tool_call(&self, name: &str, args: &[u8]) -> Result<String, ToolError> {
        (**self).execute_tool_call(name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_wire_shape() {
        let def = ToolDefinition::new("search_algolia", "Search the docs index").with_parameters(
            serde_json::json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        );

        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["name"], "search_algolia");
        assert_eq!(value["description"], "Search the docs index");
        assert_eq!(value["parameters"]["required"][0], "query");
    }

    #[test]
    fn test_tool_definition_default_parameters() {
        let def: ToolDefinition =
            serde_json::from_str(r#"{"name":"ping","description":"Ping"}"#).unwrap();
        assert_eq!(def.parameters["type"], "object");
    }
}
