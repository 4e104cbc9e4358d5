//! Transport abstraction for the quiz realtime connection.
//!
//! The [`Transport`] trait defines a bidirectional text frame channel between
//! the client and the message broker. STOMP frames are plain text, so every
//! transport implementation only has to deliver whole text messages
//! (e.g. WebSocket text frames).
//!
//! Unlike a one-shot client, the quiz client re-establishes its connection on
//! failure. It therefore takes a [`Connector`], a factory that opens a fresh
//! [`Transport`] for every attempt, instead of a single connected transport.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use quiz_live_client::error::QuizClientError;
//! use quiz_live_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), QuizClientError> {
//!         // Send one STOMP frame as a text message
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
//!         // Receive the next text message; None when closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), QuizClientError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::QuizClientError;

/// A bidirectional text message transport carrying STOMP frames.
///
/// Each call to [`send`](Transport::send) transmits one complete text message.
/// Each call to [`recv`](Transport::recv) returns one complete text message,
/// which may hold one frame, several frames, or a bare heartbeat EOL.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data. Channel-based implementations (e.g., wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a text message to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, frame: String) -> Result<(), QuizClientError>;

    /// Receive the next text message from the broker.
    ///
    /// Returns:
    /// - `Some(Ok(text))` : a complete message was received
    /// - `Some(Err(e))` : a transport error occurred
    /// - `None` : the connection was closed cleanly by the broker
    async fn recv(&mut self) -> Option<Result<String, QuizClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), QuizClientError>;
}

/// Opens a fresh [`Transport`] for each connection attempt.
///
/// The connection supervisor calls [`connect`](Connector::connect) on the first
/// attempt and again after every connectivity failure, so implementations must
/// be reusable.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type produced by this connector.
    type Transport: Transport;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::Io`] (or another transport-level variant) when
    /// the connection cannot be established.
    async fn connect(&self) -> Result<Self::Transport, QuizClientError>;
}
