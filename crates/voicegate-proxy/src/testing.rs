//! In-memory connections and collaborators for tests.
//!
//! Enabled for this crate's unit tests and, through the `test-util`
//! feature, for the gateway and integration tests.

use crate::connection::{Connection, FrameReader, FrameWriter};
use crate::error::ProxyError;
use crate::frame::Frame;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use voicegate_core::{ToolCatalogue, ToolDefinition, ToolError, ToolExecutor};

/// Writer that accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

#[async_trait]
impl FrameWriter for NullWriter {
    async fn write_frame(&self, _frame: Frame) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _code: u16, _reason: &str) -> Result<()> {
        Ok(())
    }
}

/// Writer that records frames and close calls.
#[derive(Debug, Default, Clone)]
pub struct RecordingWriter {
    frames: Arc<Mutex<Vec<Frame>>>,
    closes: Arc<Mutex<Vec<u16>>>,
}

impl RecordingWriter {
    /// Frames written so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Close codes received so far.
    pub fn closes(&self) -> Vec<u16> {
        self.closes.lock().clone()
    }
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write_frame(&self, frame: Frame) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }

    async fn close(&self, code: u16, _reason: &str) -> Result<()> {
        self.closes.lock().push(code);
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<Result<Frame>>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

struct MemoryWriter {
    tx: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
    closes: Arc<Mutex<Vec<u16>>>,
    close_delay: Arc<Mutex<Option<Duration>>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&self, frame: Frame) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProxyError::ConnectionClosed);
        }
        self.tx.send(frame).map_err(|_| ProxyError::ConnectionClosed)
    }

    async fn close(&self, code: u16, _reason: &str) -> Result<()> {
        let delay = *self.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.closes.lock().push(code);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The far end of an in-memory [`Connection`].
pub struct MemoryPeer {
    to_session: Option<mpsc::UnboundedSender<Result<Frame>>>,
    from_session: mpsc::UnboundedReceiver<Frame>,
    closes: Arc<Mutex<Vec<u16>>>,
    close_delay: Arc<Mutex<Option<Duration>>>,
}

impl MemoryPeer {
    /// Deliver a frame to the session.
    pub fn send(&self, frame: Frame) {
        if let Some(tx) = &self.to_session {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Make the session's next read fail.
    pub fn fail(&self, error: ProxyError) {
        if let Some(tx) = &self.to_session {
            let _ = tx.send(Err(error));
        }
    }

    /// End the stream; the session's reader sees end of input.
    pub fn hang_up(&mut self) {
        self.to_session = None;
    }

    /// Next frame the session wrote, waiting up to one second.
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(1), self.from_session.recv())
            .await
            .ok()
            .flatten()
    }

    /// Frame already written by the session, without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_session.try_recv().ok()
    }

    /// Make the session's close of this connection take `delay`.
    pub fn delay_close(&self, delay: Duration) {
        *self.close_delay.lock() = Some(delay);
    }

    /// Close codes the session sent, in order.
    pub fn close_codes(&self) -> Vec<u16> {
        self.closes.lock().clone()
    }
}

/// Create a connected in-memory pair.
pub fn memory_connection(peer: &str) -> (Connection, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(Mutex::new(Vec::new()));
    let close_delay = Arc::new(Mutex::new(None));

    let connection = Connection::new(
        peer,
        MemoryReader { rx: in_rx },
        MemoryWriter {
            tx: out_tx,
            closed: AtomicBool::new(false),
            closes: closes.clone(),
            close_delay: close_delay.clone(),
        },
    );
    let peer = MemoryPeer {
        to_session: Some(in_tx),
        from_session: out_rx,
        closes,
        close_delay,
    };
    (connection, peer)
}

/// Tool catalogue with a fixed list of definitions.
#[derive(Debug, Default)]
pub struct StaticCatalogue {
    definitions: Vec<ToolDefinition>,
}

impl StaticCatalogue {
    pub fn new(definitions: Vec<ToolDefinition>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl ToolCatalogue for StaticCatalogue {
    async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

/// Tool executor returning a fixed result and recording its calls.
#[derive(Debug)]
pub struct StaticExecutor {
    result: std::result::Result<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StaticExecutor {
    /// Executor that always succeeds with `output`.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            result: Ok(output.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Executor that always fails; the error is reported as an execution failure.
    pub fn err(error: ToolError) -> Self {
        Self {
            result: Err(error.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls made so far as (name, decoded arguments).
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolExecutor for StaticExecutor {
    async fn execute_tool_call(&self, name: &str, args: &[u8]) -> std::result::Result<String, ToolError> {
        let args = serde_json::from_slice(args).unwrap_or(Value::Null);
        self.calls.lock().push((name.to_string(), args));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(ToolError::ExecutionFailed)
    }
}
