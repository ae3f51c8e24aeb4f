//! Tool registry.

use crate::{ClockTool, Tool, WebhookTool};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};
use voicegate_core::config::ToolsConfig;
use voicegate_core::{ToolCatalogue, ToolDefinition, ToolError, ToolExecutor};

/// Registry of available tools.
pub struct ToolRegistry {
    /// Registered tools by name.
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Build the registry described by the `tools` config section.
    pub fn from_config(config: &ToolsConfig) -> Result<Self, ToolError> {
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();

        if config.clock {
            let clock = ClockTool::new();
            tools.insert(clock.name().to_string(), Arc::new(clock));
        }
        for webhook in &config.webhooks {
            let tool = WebhookTool::new(webhook)?;
            tools.insert(tool.name().to_string(), Arc::new(tool));
        }

        info!("Loaded {} tools", tools.len());
        Ok(Self {
            tools: RwLock::new(tools),
        })
    }

    /// Register a tool, replacing any tool with the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!("Registering tool: {}", name);
        self.tools.write().await.insert(name, tool);
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Tool names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Whether no tools are registered.
    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }
}

#[async_trait]
impl ToolCatalogue for ToolRegistry {
    async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self
            .tools
            .read()
            .await
            .values()
            .map(|tool| tool.definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute_tool_call(&self, name: &str, args: &[u8]) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args: serde_json::Value = if args.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_slice(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?
        };

        let start = Instant::now();
        let output = tool.execute(args).await?;
        debug!(
            "Tool {} completed in {}ms ({} bytes)",
            name,
            start.elapsed().as_millis(),
            output.len()
        );
        Ok(output)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").finish_non_exhaustive()
    }
}
