//! One client's conversation with the upstream agent.

use crate::connection::{Connection, FrameReader, FrameWriter};
use crate::error::ProxyError;
use crate::frame::close_code;
use crate::lifecycle::{Lifecycle, SessionState};
use crate::processor::ProcessorChain;
use crate::relay::{Direction, Pump};
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest close reason a WebSocket close frame can carry.
const MAX_CLOSE_REASON: usize = 123;

/// Connection handles and processor chains, guarded by the session mutex.
///
/// Pumps clone what they need out of here per frame and release the lock
/// before doing any I/O.
pub(crate) struct Handles {
    client_writer: Option<Arc<dyn FrameWriter>>,
    upstream_writer: Option<Arc<dyn FrameWriter>>,
    upstream_reader: Option<Box<dyn FrameReader>>,
    client_peer: Option<String>,
    inbound: Arc<ProcessorChain>,
    outbound: Arc<ProcessorChain>,
    errors: Option<mpsc::Receiver<Result<()>>>,
    pumps: Vec<JoinHandle<()>>,
}

type Route = (Arc<ProcessorChain>, Arc<dyn FrameWriter>, Arc<dyn FrameWriter>);

impl Handles {
    /// Chain, source writer and destination writer for a direction.
    pub(crate) fn route(&self, direction: Direction) -> Option<Route> {
        let client = self.client_writer.clone()?;
        let upstream = self.upstream_writer.clone()?;
        Some(match direction {
            Direction::Inbound => (self.inbound.clone(), client, upstream),
            Direction::Outbound => (self.outbound.clone(), upstream, client),
        })
    }
}

/// A client/upstream pair and the two pumps relaying between them.
///
/// Errors from either pump land in a single-slot channel: the first one is
/// returned by [`Session::wait`], later ones are only logged. Teardown runs
/// once no matter how many paths request it.
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    lifecycle: Lifecycle,
    errors: mpsc::Sender<Result<()>>,
    handles: Arc<Mutex<Handles>>,
}

impl Session {
    /// Create a session with a fresh id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create a session with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let (errors, rx) = mpsc::channel(1);
        Self {
            id: id.into(),
            started_at: Utc::now(),
            lifecycle: Lifecycle::new(),
            errors,
            handles: Arc::new(Mutex::new(Handles {
                client_writer: None,
                upstream_writer: None,
                upstream_reader: None,
                client_peer: None,
                inbound: Arc::new(ProcessorChain::new()),
                outbound: Arc::new(ProcessorChain::new()),
                errors: Some(rx),
                pumps: Vec::new(),
            })),
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Client peer, once the relay started.
    pub fn peer(&self) -> Option<String> {
        self.handles.lock().client_peer.clone()
    }

    /// Attach the upstream connection. Only one is allowed per session.
    pub fn attach_upstream(&self, upstream: Connection) -> Result<()> {
        if self.state() != SessionState::Connecting {
            return Err(ProxyError::InvalidState(self.state().as_str()));
        }

        let mut handles = self.handles.lock();
        if handles.upstream_writer.is_some() {
            return Err(ProxyError::UpstreamAlreadyAttached);
        }
        debug!(session = %self.id, "Upstream attached: {}", upstream.peer());
        let (reader, writer) = upstream.into_parts();
        handles.upstream_reader = Some(reader);
        handles.upstream_writer = Some(writer);
        Ok(())
    }

    /// Replace the processor chains. Takes effect from the next frame.
    pub fn set_processors(&self, inbound: ProcessorChain, outbound: ProcessorChain) {
        let mut handles = self.handles.lock();
        handles.inbound = Arc::new(inbound);
        handles.outbound = Arc::new(outbound);
    }

    /// Start relaying between `client` and the attached upstream.
    ///
    /// Spawns exactly two tasks, one per direction.
    pub fn start_proxy(
        &self,
        client: Connection,
        inbound: ProcessorChain,
        outbound: ProcessorChain,
    ) -> Result<()> {
        let mut handles = self.handles.lock();
        let upstream_reader = handles
            .upstream_reader
            .take()
            .ok_or(ProxyError::UpstreamNotConnected)?;

        if !self.lifecycle.start_relaying() {
            handles.upstream_reader = Some(upstream_reader);
            return Err(ProxyError::InvalidState(self.state().as_str()));
        }

        let peer = client.peer().to_string();
        let (client_reader, client_writer) = client.into_parts();
        handles.client_writer = Some(client_writer);
        handles.client_peer = Some(peer.clone());
        handles.inbound = Arc::new(inbound);
        handles.outbound = Arc::new(outbound);

        info!(
            session = %self.id,
            inbound = ?handles.inbound,
            outbound = ?handles.outbound,
            "Relaying {} to upstream",
            peer
        );

        for (direction, reader) in [
            (Direction::Inbound, client_reader),
            (Direction::Outbound, upstream_reader),
        ] {
            let pump = Pump {
                session_id: self.id.clone(),
                direction,
                reader,
                handles: self.handles.clone(),
                shutdown: self.lifecycle.shutdown().clone(),
            };
            let errors = self.errors.clone();
            let session_id = self.id.clone();
            handles.pumps.push(tokio::spawn(async move {
                if let Some(result) = pump.run().await {
                    deliver(&errors, &session_id, result);
                }
            }));
        }
        Ok(())
    }

    /// Report a terminal result. Only the first one is kept.
    pub fn report(&self, result: Result<()>) {
        deliver(&self.errors, &self.id, result);
    }

    /// Wait for the session to end, then tear it down.
    ///
    /// Ends on the first reported result, on `cancel`, or on an explicit
    /// [`close`](Session::close). Normal closure by either peer and
    /// cancellation yield `Ok(())`.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        let mut errors = self
            .handles
            .lock()
            .errors
            .take()
            .ok_or(ProxyError::InvalidState("already awaited"))?;
        let shutdown = self.lifecycle.shutdown().clone();

        let (result, code, reason) = tokio::select! {
            first = errors.recv() => match first.unwrap_or(Ok(())) {
                Ok(()) => (Ok(()), close_code::NORMAL, String::new()),
                Err(e) if e.is_normal_closure() => {
                    info!(session = %self.id, "Session ended: {}", e);
                    (Ok(()), close_code::NORMAL, String::new())
                }
                Err(e) => {
                    error!(session = %self.id, "Session failed: {}", e);
                    let code = e.close_code();
                    let reason = close_reason(&e.to_string());
                    (Err(e), code, reason)
                }
            },
            _ = cancel.cancelled() => {
                info!(session = %self.id, "Session cancelled");
                (Ok(()), close_code::GOING_AWAY, "server shutting down".to_string())
            }
            _ = shutdown.cancelled() => (Ok(()), close_code::NORMAL, String::new()),
        };

        self.close_with(code, &reason).await;
        result
    }

    /// Close both connections with a normal closure.
    pub async fn close(&self) {
        self.close_with(close_code::NORMAL, "").await;
    }

    /// Close both connections exactly once; the client gets `code`.
    ///
    /// Later callers wait until the first caller's teardown has finished.
    pub async fn close_with(&self, code: u16, reason: &str) {
        if !self.lifecycle.begin_close() {
            self.lifecycle.closed().await;
            return;
        }
        debug!(session = %self.id, code, "Closing session");

        let (pumps, client, upstream) = {
            let mut handles = self.handles.lock();
            (
                std::mem::take(&mut handles.pumps),
                handles.client_writer.clone(),
                handles.upstream_writer.clone(),
            )
        };

        for pump in pumps {
            let _ = pump.await;
        }

        if let Some(client) = client {
            if let Err(e) = client.close(code, reason).await {
                debug!(session = %self.id, "Client close failed: {}", e);
            }
        }
        if let Some(upstream) = upstream {
            if let Err(e) = upstream.close(close_code::NORMAL, "").await {
                debug!(session = %self.id, "Upstream close failed: {}", e);
            }
        }

        self.lifecycle.finish_close();
        info!(session = %self.id, "Session closed");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

fn deliver(errors: &mpsc::Sender<Result<()>>, session_id: &str, result: Result<()>) {
    match errors.try_send(result) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(Err(e)))
        | Err(mpsc::error::TrySendError::Closed(Err(e))) => {
            if e.is_normal_closure() {
                debug!(session = %session_id, "Ignoring later result: {}", e);
            } else {
                warn!(session = %session_id, "Ignoring later error: {}", e);
            }
        }
        Err(_) => {}
    }
}

fn close_reason(message: &str) -> String {
    if message.len() <= MAX_CLOSE_REASON {
        return message.to_string();
    }
    let mut end = MAX_CLOSE_REASON;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
