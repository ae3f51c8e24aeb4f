//! Proxy error types.

use crate::frame::close_code;
use std::time::Duration;
use thiserror::Error;
use voicegate_core::ToolError;

/// Errors that terminate (or prevent) a proxy session.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream could not be reached within the retry budget.
    #[error("Upstream connection failed after {attempts} attempts: {last}")]
    ConnectFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Cause of the final attempt.
        last: Box<ProxyError>,
    },

    /// The relay was started without an upstream connection.
    #[error("Upstream connection is not established")]
    UpstreamNotConnected,

    /// An upstream connection is already attached to the session.
    #[error("Session already has an upstream connection")]
    UpstreamAlreadyAttached,

    /// The session is past the point where the requested operation applies.
    #[error("Session is {0}")]
    InvalidState(&'static str),

    /// Read or write failure on a connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer sent a close frame with an abnormal status code.
    #[error("Peer closed with code {code}: {reason}")]
    PeerClosed {
        /// Status code from the close frame.
        code: u16,
        /// Reason from the close frame.
        reason: String,
    },

    /// A claimed frame did not match its expected shape.
    #[error("Malformed {message_type} message: {reason}")]
    Protocol {
        /// Discriminator of the offending frame.
        message_type: &'static str,
        /// Decode failure.
        reason: String,
    },

    /// The tool executor failed.
    #[error("Tool '{name}' failed: {source}")]
    Tool {
        /// Tool name.
        name: String,
        /// Executor error.
        #[source]
        source: ToolError,
    },

    /// The tool executor did not answer in time.
    #[error("Tool '{name}' timed out after {timeout:?}")]
    ToolTimeout {
        /// Tool name.
        name: String,
        /// Configured bound.
        timeout: Duration,
    },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// Build a protocol error for a claimed frame.
    pub fn protocol(message_type: &'static str, reason: impl ToString) -> Self {
        Self::Protocol {
            message_type,
            reason: reason.to_string(),
        }
    }

    /// Whether this represents an expected end of the conversation.
    pub fn is_normal_closure(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// WebSocket close code reported to the client for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::ConnectionClosed => close_code::NORMAL,
            Self::Protocol { .. } | Self::Json(_) => close_code::PROTOCOL,
            _ => close_code::INTERNAL,
        }
    }
}
