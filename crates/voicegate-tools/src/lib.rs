//! # voicegate-tools
//!
//! Tools the upstream agent can call through the gateway.
//!
//! - [`Tool`] trait for implementing tools
//! - [`ToolRegistry`], which serves as both the tool catalogue advertised in
//!   session settings and the executor for intercepted function calls
//! - [`WebhookTool`] forwarding calls to a configured HTTP endpoint
//! - [`ClockTool`] returning the current time

mod clock;
mod registry;
mod webhook;

pub use clock::ClockTool;
pub use registry::ToolRegistry;
pub use webhook::WebhookTool;

use async_trait::async_trait;
use voicegate_core::{ToolDefinition, ToolError};

/// A tool the upstream agent can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the definition advertised to the agent.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with decoded JSON arguments and return plain text.
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError>;
}
