//! # Quiz Live Client
//!
//! Realtime client core for a live, multi-team quiz.
//!
//! A host drives the quiz through its phases while participant teams answer
//! questions; every client keeps a synchronized view of the game over one
//! STOMP-over-WebSocket connection.
//!
//! ## Layers
//!
//! - **Session** ([`session`]): which quiz and identity this client uses,
//!   persisted in a single slot.
//! - **Transport client** ([`client`]): connection supervision, subscriptions,
//!   publishing, heartbeats, and the fixed-delay reconnect policy.
//! - **Decoder** ([`decoder`]): wire JSON into typed [`GameEvent`]s with the
//!   phase vocabulary normalized.
//! - **View** ([`view`]): the [`GameView`] reducer, rankings, timer, selection
//!   and submission rules.
//! - **Navigation** ([`navigation`]) and **commands** ([`commands`]).
//!
//! [`QuizSession`] wires the layers together for one client.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let config = QuizClientConfig::from_env();
//! let connector = WebSocketConnector::new(config.url.clone());
//! let session = HttpAccessResolver::default().resolve_session("1234").await?;
//! let mut quiz = QuizSession::start(connector, config, session);
//!
//! while let Some(update) = quiz.next_event().await {
//!     if let Some(screen) = update.navigate_to {
//!         println!("go to {}", screen.route(quiz.session().role()));
//!     }
//! }
//! ```

pub mod access;
pub mod client;
pub mod commands;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod navigation;
pub mod phase;
pub mod protocol;
pub mod rankings;
pub mod session;
pub mod session_driver;
pub mod stomp;
pub mod transport;
pub mod transports;
pub mod view;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "access-http")]
pub use access::HttpAccessResolver;
pub use access::{AccessResolution, RouteType};
pub use client::{ConnectParams, QuizClient};
pub use commands::{available_commands, AnswerSubmission, HostCommand};
pub use config::{Endpoints, QuizClientConfig};
pub use error::QuizClientError;
pub use event::{ClientEvent, GameEvent, StateUpdate};
pub use navigation::{target_screen, Navigator, Screen};
pub use phase::GamePhase;
pub use protocol::{CommandType, Role};
pub use rankings::{process_rankings, RankedEntry};
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage, SessionStore};
pub use session_driver::{QuizSession, SessionUpdate};
pub use transport::{Connector, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
pub use view::{GameView, Rejection, TimerUrgency};
