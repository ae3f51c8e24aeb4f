//! Answers upstream function calls locally.

use crate::codec::{message_types, FunctionCallRequest, FunctionCallResponse};
use crate::connection::FrameWriter;
use crate::error::ProxyError;
use crate::frame::{Frame, FrameKind};
use crate::processor::{MessageProcessor, Outcome};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use voicegate_core::ToolExecutor;

/// Outbound processor that executes `FunctionCallRequest` frames with the
/// gateway's tool executor and writes the `FunctionCallResponse` straight
/// back to the upstream agent. The request never reaches the client.
pub struct FunctionCallProcessor {
    executor: Arc<dyn ToolExecutor>,
    timeout: Option<Duration>,
}

impl FunctionCallProcessor {
    /// Create a processor without a per-call time limit.
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            timeout: None,
        }
    }

    /// Bound every executor call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn execute(&self, request: &FunctionCallRequest) -> Result<String> {
        let args = serde_json::to_vec(&request.input)?;
        let call = self
            .executor
            .execute_tool_call(&request.function_name, &args);

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                ProxyError::ToolTimeout {
                    name: request.function_name.clone(),
                    timeout,
                }
            })?,
            None => call.await,
        };

        result.map_err(|source| ProxyError::Tool {
            name: request.function_name.clone(),
            source,
        })
    }
}

#[async_trait]
impl MessageProcessor for FunctionCallProcessor {
    fn name(&self) -> &str {
        "function_call"
    }

    fn message_types(&self) -> &[&'static str] {
        &[message_types::FUNCTION_CALL_REQUEST]
    }

    async fn process(
        &self,
        _kind: FrameKind,
        payload: &Bytes,
        source: &dyn FrameWriter,
    ) -> Result<Outcome> {
        let request: FunctionCallRequest = serde_json::from_slice(payload)
            .map_err(|e| ProxyError::protocol(message_types::FUNCTION_CALL_REQUEST, e))?;

        info!(
            function = %request.function_name,
            correlation_id = %request.correlation_id,
            "Executing function call"
        );
        let started = Instant::now();
        let output = self.execute(&request).await?;

        let response = FunctionCallResponse::new(request.correlation_id.clone(), output);
        source.write_frame(Frame::text(response.to_payload()?)).await?;

        info!(
            function = %request.function_name,
            correlation_id = %request.correlation_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Function call answered"
        );
        Ok(Outcome::Suppress)
    }
}
