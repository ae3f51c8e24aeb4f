//! Transport-neutral frames and conversions from the WebSocket libraries.

use crate::error::ProxyError;
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;

/// WebSocket close codes used by the relay.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away (server shutdown).
    pub const GOING_AWAY: u16 = 1001;
    /// Protocol error.
    pub const PROTOCOL: u16 = 1002;
    /// Internal server error.
    pub const INTERNAL: u16 = 1011;
}

/// Transport-level kind of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

/// One message unit read from or written to a connection.
///
/// Close frames carry the RFC 6455 payload: a big-endian status code
/// followed by the UTF-8 reason, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Bytes,
}

impl Frame {
    /// Create a frame of any kind.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Create a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, Bytes::from(text.into()))
    }

    /// Create a binary frame.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Binary, data)
    }

    /// Create a close frame with a status code and reason.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(code);
        payload.put_slice(reason.as_bytes());
        Self::new(FrameKind::Close, payload.freeze())
    }

    /// Frame kind.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Raw payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this frame may be inspected by processors.
    pub fn is_text(&self) -> bool {
        self.kind == FrameKind::Text
    }

    /// Whether this frame ends the conversation.
    pub fn is_close(&self) -> bool {
        self.kind == FrameKind::Close
    }

    /// Same kind, different payload.
    pub fn with_payload(&self, payload: Bytes) -> Self {
        Self::new(self.kind, payload)
    }

    /// Status code and reason of a close frame.
    pub fn close_parts(&self) -> Option<(u16, Cow<'_, str>)> {
        if self.kind != FrameKind::Close || self.payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        Some((code, String::from_utf8_lossy(&self.payload[2..])))
    }

    /// Payload as text; text frames are always valid UTF-8.
    fn into_text(self) -> String {
        match String::from_utf8(self.payload.to_vec()) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    fn into_vec(self) -> Vec<u8> {
        self.payload.to_vec()
    }
}

/// A WebSocket library message type the relay can carry.
pub trait WireMessage: Sized + Send + Unpin + 'static {
    /// Library error type for reads and writes.
    type Error: Send + 'static;

    /// Convert to a frame; `None` for library-internal messages.
    fn into_frame(self) -> Option<Frame>;

    /// Convert a frame back into a library message.
    fn from_frame(frame: Frame) -> Self;

    /// Map a library error into the relay taxonomy.
    fn transport_error(err: Self::Error) -> ProxyError;
}

impl WireMessage for axum::extract::ws::Message {
    type Error = axum::Error;

    fn into_frame(self) -> Option<Frame> {
        use axum::extract::ws::Message;

        Some(match self {
            Message::Text(text) => Frame::text(text),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) => Frame::new(FrameKind::Ping, data),
            Message::Pong(data) => Frame::new(FrameKind::Pong, data),
            Message::Close(Some(close)) => Frame::close(close.code, &close.reason),
            Message::Close(None) => Frame::new(FrameKind::Close, Bytes::new()),
        })
    }

    fn from_frame(frame: Frame) -> Self {
        use axum::extract::ws::{CloseFrame, Message};

        match frame.kind {
            FrameKind::Text => Message::Text(frame.into_text()),
            FrameKind::Binary => Message::Binary(frame.into_vec()),
            FrameKind::Ping => Message::Ping(frame.into_vec()),
            FrameKind::Pong => Message::Pong(frame.into_vec()),
            FrameKind::Close => Message::Close(frame.close_parts().map(|(code, reason)| {
                CloseFrame {
                    code,
                    reason: Cow::Owned(reason.into_owned()),
                }
            })),
        }
    }

    fn transport_error(err: axum::Error) -> ProxyError {
        ProxyError::Transport(err.to_string())
    }
}

impl WireMessage for tokio_tungstenite::tungstenite::Message {
    type Error = tokio_tungstenite::tungstenite::Error;

    fn into_frame(self) -> Option<Frame> {
        use tokio_tungstenite::tungstenite::Message;

        Some(match self {
            Message::Text(text) => Frame::text(text),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) => Frame::new(FrameKind::Ping, data),
            Message::Pong(data) => Frame::new(FrameKind::Pong, data),
            Message::Close(Some(close)) => Frame::close(close.code.into(), &close.reason),
            Message::Close(None) => Frame::new(FrameKind::Close, Bytes::new()),
            Message::Frame(_) => return None,
        })
    }

    fn from_frame(frame: Frame) -> Self {
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::Message;

        match frame.kind {
            FrameKind::Text => Message::Text(frame.into_text()),
            FrameKind::Binary => Message::Binary(frame.into_vec()),
            FrameKind::Ping => Message::Ping(frame.into_vec()),
            FrameKind::Pong => Message::Pong(frame.into_vec()),
            FrameKind::Close => Message::Close(frame.close_parts().map(|(code, reason)| {
                CloseFrame {
                    code: code.into(),
                    reason: Cow::Owned(reason.into_owned()),
                }
            })),
        }
    }

    fn transport_error(err: Self::Error) -> ProxyError {
        use tokio_tungstenite::tungstenite::Error;

        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => ProxyError::ConnectionClosed,
            other => ProxyError::Transport(other.to_string()),
        }
    }
}
