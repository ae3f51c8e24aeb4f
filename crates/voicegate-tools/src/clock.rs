//! Built-in clock tool.

use crate::Tool;
use async_trait::async_trait;
use chrono::{FixedOffset, SecondsFormat, Utc};
use serde_json::Value;
use voicegate_core::{ToolDefinition, ToolError};

/// Returns the current time as RFC 3339.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockTool;

impl ClockTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "current_time",
            "Get the current date and time. Use when the caller asks what time or day it is.",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "utc_offset_hours": {
                    "type": "number",
                    "description": "Offset from UTC in hours, e.g. -5 or 5.5. Defaults to UTC."
                }
            }
        }))
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let offset = match args.get("utc_offset_hours") {
            None | Some(Value::Null) => 0.0,
            Some(value) => value.as_f64().ok_or_else(|| {
                ToolError::InvalidInput("utc_offset_hours must be a number".into())
            })?,
        };

        let offset = FixedOffset::east_opt((offset * 3600.0).round() as i32).ok_or_else(|| {
            ToolError::InvalidInput(format!("utc_offset_hours {} is out of range", offset))
        })?;

        Ok(Utc::now()
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
