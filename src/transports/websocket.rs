//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries STOMP frames as WebSocket text messages.
//! [`WebSocketConnector`] opens a fresh one for every connection attempt made
//! by the [`QuizClient`](crate::client::QuizClient). Both `ws://` and `wss://`
//! URLs are supported.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), quiz_live_client::QuizClientError> {
//! use quiz_live_client::{Transport, WebSocketTransport};
//!
//! let mut transport =
//!     WebSocketTransport::connect("ws://localhost:8090/ws/quiz/websocket").await?;
//! transport.send("CONNECT\naccept-version:1.2\n\n\0".to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("broker said: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::QuizClientError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by one WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not lose a message.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::Io`] if the URL is invalid or the connection
    /// cannot be established. I/O error kinds are preserved; everything else
    /// maps to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, QuizClientError> {
        tracing::debug!(url = %url, "opening WebSocket");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            QuizClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::debug!(url = %url, "WebSocket open");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established stream (custom TLS, proxies, extra headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), QuizClientError> {
        if self.closed {
            return Err(QuizClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| QuizClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(QuizClientError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                // Some brokers send STOMP frames as binary messages.
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::warn!("skipping non-UTF-8 binary WebSocket message"),
                },
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), QuizClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| QuizClientError::TransportSend(e.to_string()))
    }
}

/// Opens a [`WebSocketTransport`] to a fixed URL for every attempt.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    timeout: Option<Duration>,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }

    /// Bound the WebSocket opening handshake on its own, separately from the
    /// client's overall connect timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport, QuizClientError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, WebSocketTransport::connect(&self.url))
                .await
                .map_err(|_| QuizClientError::Timeout)?,
            None => WebSocketTransport::connect(&self.url).await,
        }
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::client::{ConnectParams, QuizClient};
    use crate::config::QuizClientConfig;
    use crate::event::{ClientEvent, GameEvent};
    use crate::phase::GamePhase;
    use crate::protocol::Role;
    use crate::stomp::{self, Frame, StompCommand};
    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
        assert_send::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not a url").await.unwrap_err();
        assert!(matches!(err, QuizClientError::Io(_)));
    }

    #[tokio::test]
    async fn connector_reports_unreachable_host() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:1");
        assert!(matches!(
            connector.connect().await.unwrap_err(),
            QuizClientError::Io(_)
        ));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    /// Accept one WebSocket connection, hand it to `handler`, return its URL.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_receives_text_and_utf8_binary() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("CONNECTED\n\n\0".into()))
                .await
                .unwrap();
            ws.send(Message::Binary(b"RECEIPT\nreceipt-id:1\n\n\0".to_vec().into()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![0xff, 0xfe].into()))
                .await
                .unwrap();
            ws.send(Message::Text("\n".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "CONNECTED\n\n\0");
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            "RECEIPT\nreceipt-id:1\n\n\0"
        );
        assert_eq!(transport.recv().await.unwrap().unwrap(), "\n");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        let err = transport.send("DISCONNECT\n\n\0".into()).await.unwrap_err();
        assert!(matches!(err, QuizClientError::TransportClosed));
    }

    #[tokio::test]
    async fn client_handshake_over_real_socket() {
        let url = start_mock_server(|mut ws| async move {
            let Some(Ok(Message::Text(connect))) = ws.next().await else {
                panic!("expected CONNECT");
            };
            let connect = &stomp::parse_message(&connect).unwrap()[0];
            assert_eq!(connect.header("accessCode"), Some("PIN"));
            ws.send(Message::Text(
                Frame::new(StompCommand::Connected)
                    .with_header("version", "1.2")
                    .encode()
                    .into(),
            ))
            .await
            .unwrap();

            // Four participant subscriptions.
            for _ in 0..4 {
                let Some(Ok(Message::Text(sub))) = ws.next().await else {
                    panic!("expected SUBSCRIBE");
                };
                assert!(sub.starts_with("SUBSCRIBE\n"));
            }

            let state = Frame::new(StompCommand::Message)
                .with_header("subscription", "sub-0")
                .with_header("destination", "/topic/quiz/3/state")
                .with_body(r#"{"state":"LOBBY","quizId":3}"#);
            ws.send(Message::Text(state.encode().into())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let config = QuizClientConfig::new(url.clone());
        let (mut client, mut events) = QuizClient::new(WebSocketConnector::new(url), config);
        client.connect(ConnectParams::new(3, Role::Participant).with_access_code("PIN"));

        assert!(matches!(
            events.recv().await.unwrap(),
            ClientEvent::Connecting { attempt: 0 }
        ));
        assert_eq!(events.recv().await.unwrap(), ClientEvent::Connected);
        match events.recv().await.unwrap() {
            ClientEvent::Game(GameEvent::StateUpdate(update)) => {
                assert_eq!(update.phase, GamePhase::Lobby);
            }
            other => panic!("unexpected event {other:?}"),
        }
        client.disconnect().await;
    }
}
