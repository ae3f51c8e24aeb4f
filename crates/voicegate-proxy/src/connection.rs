//! Connection halves shared by the client and upstream legs of a session.

use crate::error::ProxyError;
use crate::frame::{Frame, WireMessage};
use crate::Result;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Read half of a connection, owned by exactly one pump loop.
#[async_trait]
pub trait FrameReader: Send {
    /// Read the next frame; `Ok(None)` once the peer has finished.
    async fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// Write half of a connection, shared between the pump that forwards into it
/// and processors replying onto it.
#[async_trait]
pub trait FrameWriter: Send + Sync {
    /// Write one frame.
    async fn write_frame(&self, frame: Frame) -> Result<()>;

    /// Send a close frame and shut the write side down.
    async fn close(&self, code: u16, reason: &str) -> Result<()>;
}

/// Both halves of one connection.
pub struct Connection {
    peer: String,
    pub(crate) reader: Box<dyn FrameReader>,
    pub(crate) writer: Arc<dyn FrameWriter>,
}

impl Connection {
    /// Assemble a connection from its halves.
    pub fn new(
        peer: impl Into<String>,
        reader: impl FrameReader + 'static,
        writer: impl FrameWriter + 'static,
    ) -> Self {
        Self {
            peer: peer.into(),
            reader: Box::new(reader),
            writer: Arc::new(writer),
        }
    }

    /// Human-readable peer description (address or URL).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Shared handle to the write half.
    pub fn writer(&self) -> Arc<dyn FrameWriter> {
        self.writer.clone()
    }

    /// Split into read and write halves.
    pub fn into_parts(self) -> (Box<dyn FrameReader>, Arc<dyn FrameWriter>) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}

/// [`FrameReader`] over a WebSocket message stream.
pub struct StreamReader<S, M> {
    stream: S,
    _message: PhantomData<fn() -> M>,
}

impl<S, M> StreamReader<S, M> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<S, M> FrameReader for StreamReader<S, M>
where
    S: Stream<Item = std::result::Result<M, M::Error>> + Unpin + Send,
    M: WireMessage,
{
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(message)) => {
                    if let Some(frame) = message.into_frame() {
                        return Ok(Some(frame));
                    }
                }
                Some(Err(e)) => return Err(M::transport_error(e)),
            }
        }
    }
}

/// [`FrameWriter`] over a WebSocket message sink.
///
/// The sink sits behind an async mutex so the forwarding pump and a replying
/// processor can both write without interleaving partial sends.
pub struct SinkWriter<K, M> {
    sink: Mutex<K>,
    _message: PhantomData<fn(M)>,
}

impl<K, M> SinkWriter<K, M> {
    pub fn new(sink: K) -> Self {
        Self {
            sink: Mutex::new(sink),
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<K, M> FrameWriter for SinkWriter<K, M>
where
    K: Sink<M, Error = M::Error> + Unpin + Send + 'static,
    M: WireMessage,
{
    async fn write_frame(&self, frame: Frame) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(M::from_frame(frame))
            .await
            .map_err(M::transport_error)
    }

    async fn close(&self, code: u16, reason: &str) -> Result<()> {
        let mut sink = self.sink.lock().await;
        // The peer may already be gone; the close frame is best effort.
        let _ = sink.send(M::from_frame(Frame::close(code, reason))).await;
        match sink.close().await.map_err(M::transport_error) {
            Err(ProxyError::ConnectionClosed) => Ok(()),
            other => other,
        }
    }
}

/// Split a WebSocket into a [`Connection`].
pub fn split_socket<S, M>(socket: S, peer: impl Into<String>) -> Connection
where
    S: Stream<Item = std::result::Result<M, M::Error>> + Sink<M, Error = M::Error> + Send + 'static,
    M: WireMessage,
{
    let (sink, stream) = socket.split::<M>();
    Connection::new(
        peer,
        StreamReader::<_, M>::new(stream),
        SinkWriter::<_, M>::new(sink),
    )
}
