//! Real-time voice agent relay for Voicegate.
//!
//! A [`Session`] pairs one client connection with one upstream agent
//! connection and runs two pump loops, one per direction. Every text frame
//! goes through an ordered [`ProcessorChain`] that may pass it through,
//! rewrite it, swallow it, or abort the session:
//!
//! - inbound (client to upstream): [`SettingsProcessor`] overwrites the
//!   client's function list with the gateway's tool catalogue
//! - outbound (upstream to client): [`FunctionCallProcessor`] answers
//!   function calls locally so the client never sees them
//!
//! [`ProxyEngine::run_session`] is the entry point used by the gateway.

pub mod codec;
pub mod connection;
pub mod connector;
pub mod engine;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod processor;
pub mod processors;
pub mod registry;
pub mod relay;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{split_socket, Connection, FrameReader, FrameWriter};
pub use connector::{Dialer, UpstreamConnector, WebSocketDialer};
pub use engine::{EngineOptions, ProxyEngine};
pub use error::ProxyError;
pub use frame::{Frame, FrameKind};
pub use lifecycle::SessionState;
pub use processor::{MessageProcessor, Outcome, ProcessorChain};
pub use processors::{FunctionCallProcessor, SettingsProcessor};
pub use registry::{SessionRegistry, SessionSummary};
pub use relay::Direction;
pub use session::Session;

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
