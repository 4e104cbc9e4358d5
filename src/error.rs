//! Error types for the quiz client.

use thiserror::Error;

/// Errors that can occur when using the quiz client.
#[derive(Debug, Error)]
pub enum QuizClientError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a JSON message body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// A STOMP frame could not be parsed, or arrived out of protocol order.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker answered with a STOMP `ERROR` frame.
    #[error("server error: {message}")]
    ServerError {
        /// Value of the frame's `message` header (or its body when the header is absent).
        message: String,
    },

    /// No inbound traffic (frames or heartbeats) within the negotiated heartbeat window.
    #[error("heartbeat timeout: no traffic for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The session storage backend failed to read or write.
    #[error("session storage error: {0}")]
    Storage(String),

    /// The access code could not be resolved to a session.
    #[error("access resolution failed: {0}")]
    AccessResolution(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for quiz client operations.
pub type Result<T> = std::result::Result<T, QuizClientError>;
