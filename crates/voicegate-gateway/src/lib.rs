//! HTTP/WebSocket gateway server for Voicegate.
//!
//! This crate provides:
//! - The authenticated WebSocket endpoint that hands clients to the proxy engine
//! - Health and live-session endpoints
//! - CORS and request tracing

pub mod error;
pub mod server;

pub use error::GatewayError;
pub use server::{Gateway, GatewayState};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
