//! Message processor contract and ordered processor chains.

use crate::codec;
use crate::connection::FrameWriter;
use crate::frame::{Frame, FrameKind};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decision a processor takes for a frame.
///
/// Failing is expressed as the `Err` arm of [`MessageProcessor::process`];
/// any error aborts the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not mine; ask the next processor.
    Decline,

    /// Handled here; forward nothing.
    Suppress,

    /// Forward these bytes instead of the original payload.
    Transform(Bytes),
}

/// A unit of interception logic bound to one or more message types.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Discriminator values this processor is offered.
    fn message_types(&self) -> &[&'static str];

    /// Whether the processor is offered a frame with this discriminator.
    fn claims(&self, message_type: Option<&str>) -> bool {
        message_type.is_some_and(|t| self.message_types().contains(&t))
    }

    /// Process a text frame. `source` is the connection the frame came from
    /// and may be used to reply directly.
    async fn process(
        &self,
        kind: FrameKind,
        payload: &Bytes,
        source: &dyn FrameWriter,
    ) -> Result<Outcome>;
}

/// Ordered list of processors applied to one direction of a session.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl ProcessorChain {
    /// Create an empty chain (pure passthrough).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processor.
    pub fn with(mut self, processor: impl MessageProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Append a shared processor.
    pub fn push(&mut self, processor: Arc<dyn MessageProcessor>) {
        self.processors.push(processor);
    }

    /// Number of processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Processor names in order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run a frame through the chain.
    ///
    /// The first processor that does not decline decides. When every
    /// processor declines the original payload is forwarded unchanged, so
    /// the result is never [`Outcome::Decline`].
    pub async fn process_message(&self, frame: &Frame, source: &dyn FrameWriter) -> Result<Outcome> {
        if !frame.is_text() || self.processors.is_empty() {
            return Ok(Outcome::Transform(frame.payload().clone()));
        }

        let message_type = codec::sniff_type(frame.payload());
        for processor in &self.processors {
            if !processor.claims(message_type.as_deref()) {
                continue;
            }

            match processor.process(frame.kind(), frame.payload(), source).await? {
                Outcome::Decline => {
                    trace!("{} declined {:?}", processor.name(), message_type);
                }
                outcome => {
                    debug!(
                        processor = processor.name(),
                        message_type = message_type.as_deref().unwrap_or_default(),
                        suppressed = matches!(outcome, Outcome::Suppress),
                        "Message intercepted"
                    );
                    return Ok(outcome);
                }
            }
        }

        Ok(Outcome::Transform(frame.payload().clone()))
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
