//! The `error` module defines the error types used within `pubrelay`.
//!
//! Transport faults are kept separate from client-level conditions so that
//! the broker can tell an ordinary shutdown (`ContextClosed`) apart from a
//! real failure, and so callers of the client can tell a recoverable
//! `Timeout` apart from protocol misuse.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the WebSocket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The owning `Context` was terminated. This is the normal shutdown
    /// signal for anything blocked on a bound endpoint.
    #[error("transport context closed")]
    ContextClosed,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed wire message: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors raised by the client harness.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No matching message arrived within the budget. Recoverable.
    #[error("timed out after {0:?} waiting for a matching message")]
    Timeout(Duration),

    /// Another call is already waiting for messages on this client.
    #[error("another consumer is already waiting on this client")]
    ConcurrentWait,

    /// Waiting on a topic the client never subscribed to can never succeed.
    #[error("not subscribed to topic '{0}'")]
    NotSubscribed(String),

    /// Subscription probes never echoed back; the broker is unreachable.
    #[error("subscription handshake failed after {attempts} attempts for topics {topics:?}")]
    HandshakeFailed { topics: Vec<String>, attempts: u32 },

    #[error("client is not running")]
    NotRunning,

    #[error("client was already started")]
    AlreadyStarted,

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("request envelope carries no correlation id")]
    MissingCorrelationId,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ClientError {
    /// True for the only condition a caller is expected to retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}
