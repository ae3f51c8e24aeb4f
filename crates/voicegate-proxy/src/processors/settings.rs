//! Injects the gateway's tool catalogue into client settings.

use crate::codec::{self, message_types, SettingsMessage};
use crate::connection::FrameWriter;
use crate::error::ProxyError;
use crate::frame::FrameKind;
use crate::processor::{MessageProcessor, Outcome};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use voicegate_core::ToolCatalogue;

/// Inbound processor that overwrites `agent.think.functions` in the
/// client's settings with the current tool catalogue.
pub struct SettingsProcessor {
    catalogue: Arc<dyn ToolCatalogue>,
}

impl SettingsProcessor {
    pub fn new(catalogue: Arc<dyn ToolCatalogue>) -> Self {
        Self { catalogue }
    }
}

#[async_trait]
impl MessageProcessor for SettingsProcessor {
    fn name(&self) -> &str {
        "settings"
    }

    fn message_types(&self) -> &[&'static str] {
        &[message_types::SETTINGS, message_types::SETTINGS_CONFIGURATION]
    }

    async fn process(
        &self,
        _kind: FrameKind,
        payload: &Bytes,
        _source: &dyn FrameWriter,
    ) -> Result<Outcome> {
        let message_type = match codec::sniff_type(payload).as_deref() {
            Some(message_types::SETTINGS_CONFIGURATION) => message_types::SETTINGS_CONFIGURATION,
            _ => message_types::SETTINGS,
        };
        let mut settings: SettingsMessage = serde_json::from_slice(payload)
            .map_err(|e| ProxyError::protocol(message_type, e))?;

        let functions = self.catalogue.tool_definitions().await;
        debug!(
            client_functions = settings.agent.think.functions.len(),
            injected_functions = functions.len(),
            "Injecting tool catalogue into settings"
        );
        settings.replace_functions(&functions)?;

        Ok(Outcome::Transform(settings.to_payload()?))
    }
}
