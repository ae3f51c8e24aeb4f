//! The per-direction pump loop.

use crate::connection::FrameReader;
use crate::error::ProxyError;
use crate::frame::close_code;
use crate::processor::Outcome;
use crate::session::Handles;
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Direction of a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to upstream.
    Inbound,
    /// Upstream to client.
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Flow {
    Continue,
    Finished,
}

/// One direction of a session: reads from its source and forwards to the
/// opposite connection through that direction's processor chain.
pub(crate) struct Pump {
    pub(crate) session_id: String,
    pub(crate) direction: Direction,
    pub(crate) reader: Box<dyn FrameReader>,
    pub(crate) handles: Arc<Mutex<Handles>>,
    pub(crate) shutdown: CancellationToken,
}

impl Pump {
    /// Run until the source ends, a step fails, or the session shuts down.
    ///
    /// Returns `None` when stopped by shutdown; there is nothing to report
    /// in that case.
    pub(crate) async fn run(mut self) -> Option<Result<()>> {
        let shutdown = self.shutdown.clone();
        let session_id = self.session_id.clone();
        let direction = self.direction;
        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    trace!(session = %session_id, "{} pump stopped", direction);
                    return None;
                }
                step = self.step() => step,
            };

            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finished) => return Some(Ok(())),
                Err(e) => {
                    debug!(session = %session_id, "{} pump failed: {}", direction, e);
                    return Some(Err(e));
                }
            }
        }
    }

    async fn step(&mut self) -> Result<Flow> {
        let frame = match self.reader.read_frame().await? {
            Some(frame) => frame,
            None => {
                debug!(session = %self.session_id, "{} source ended", self.direction);
                return Ok(Flow::Finished);
            }
        };

        // Resolve the route per frame so processor swaps apply to the next frame.
        let route = self.handles.lock().route(self.direction);
        let (chain, source, destination) = route.ok_or(ProxyError::InvalidState("not relaying"))?;

        if frame.is_close() {
            debug!(
                session = %self.session_id,
                "{} peer closed: {:?}",
                self.direction,
                frame.close_parts()
            );
            let abnormal = match frame.close_parts() {
                Some((code, reason)) if !is_normal_close(code) => Some(ProxyError::PeerClosed {
                    code,
                    reason: reason.into_owned(),
                }),
                _ => None,
            };
            // The destination may already be gone; the session closes it either way.
            let _ = destination.write_frame(frame).await;
            return match abnormal {
                Some(e) => Err(e),
                None => Ok(Flow::Finished),
            };
        }

        if !frame.is_text() {
            destination.write_frame(frame).await?;
            return Ok(Flow::Continue);
        }

        trace!(
            session = %self.session_id,
            bytes = frame.payload().len(),
            "{} text frame",
            self.direction
        );
        match chain.process_message(&frame, source.as_ref()).await? {
            Outcome::Suppress => {}
            Outcome::Transform(payload) => {
                destination.write_frame(frame.with_payload(payload)).await?;
            }
            Outcome::Decline => destination.write_frame(frame).await?,
        }
        Ok(Flow::Continue)
    }
}

/// Close codes that end a conversation without anything going wrong.
fn is_normal_close(code: u16) -> bool {
    matches!(code, close_code::NORMAL | close_code::GOING_AWAY)
}
