//! Connection configuration and broker endpoint naming.

use std::time::Duration;

/// Default broker URL when neither the caller nor `QUIZ_WS_URL` supplies one.
pub const DEFAULT_URL: &str = "ws://localhost:8090/ws/quiz/websocket";

/// Environment variable read by [`QuizClientConfig::from_env`].
pub const URL_ENV: &str = "QUIZ_WS_URL";

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);
const DEFAULT_MANUAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`QuizClient`](crate::client::QuizClient).
///
/// # Example
///
/// ```
/// use quiz_live_client::config::QuizClientConfig;
/// use std::time::Duration;
///
/// let config = QuizClientConfig::new("ws://quiz.example/ws/quiz/websocket")
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_delay(Duration::from_secs(2));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// assert_eq!(config.reconnect_delay, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct QuizClientConfig {
    /// WebSocket URL of the STOMP broker endpoint.
    pub url: String,
    /// Fixed delay between automatic reconnection attempts.
    ///
    /// Defaults to **5 seconds**, never more than `max_reconnect_delay`.
    pub reconnect_delay: Duration,
    /// Upper bound applied to `reconnect_delay`. Defaults to **30 seconds**.
    pub max_reconnect_delay: Duration,
    /// Connectivity failures tolerated before auto-retry stops and a terminal
    /// error is surfaced. Defaults to **10**; values below 1 are clamped to 1.
    pub max_reconnect_attempts: u32,
    /// Interval at which the broker is asked to send heartbeats. Zero disables.
    pub heartbeat_incoming: Duration,
    /// Interval at which the client offers to send heartbeats. Zero disables.
    pub heartbeat_outgoing: Duration,
    /// Delay before re-establishing the connection after a manual reconnect.
    pub manual_reconnect_delay: Duration,
    /// Deadline for opening the transport and completing the STOMP handshake.
    pub connect_timeout: Duration,
    /// Capacity of the bounded event channel. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the background loop gets to unsubscribe and close on shutdown
    /// before it is aborted.
    pub shutdown_timeout: Duration,
}

impl QuizClientConfig {
    /// Create a configuration for the given broker URL with default tuning.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_incoming: DEFAULT_HEARTBEAT,
            heartbeat_outgoing: DEFAULT_HEARTBEAT,
            manual_reconnect_delay: DEFAULT_MANUAL_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Create a configuration from `QUIZ_WS_URL`, falling back to [`DEFAULT_URL`].
    pub fn from_env() -> Self {
        let url = std::env::var(URL_ENV).unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(url)
    }

    /// Set the fixed delay between automatic reconnection attempts.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay.min(self.max_reconnect_delay);
        self
    }

    /// Set the upper bound for the reconnection delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, max: Duration) -> Self {
        self.max_reconnect_delay = max;
        self.reconnect_delay = self.reconnect_delay.min(max);
        self
    }

    /// Set how many connectivity failures are tolerated before giving up.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts.max(1);
        self
    }

    /// Set both heartbeat directions.
    #[must_use]
    pub fn with_heartbeat(mut self, incoming: Duration, outgoing: Duration) -> Self {
        self.heartbeat_incoming = incoming;
        self.heartbeat_outgoing = outgoing;
        self
    }

    /// Set the delay used by a manual reconnect.
    #[must_use]
    pub fn with_manual_reconnect_delay(mut self, delay: Duration) -> Self {
        self.manual_reconnect_delay = delay;
        self
    }

    /// Set the connection + handshake deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for QuizClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// Topic and destination names for one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    quiz_id: i64,
}

impl Endpoints {
    /// Private queue carrying error strings for this connection.
    pub const ERRORS: &'static str = "/user/queue/errors";

    pub fn new(quiz_id: i64) -> Self {
        Self { quiz_id }
    }

    pub fn state(&self) -> String {
        format!("/topic/quiz/{}/state", self.quiz_id)
    }

    pub fn timer(&self) -> String {
        format!("/topic/quiz/{}/timer", self.quiz_id)
    }

    pub fn teams(&self) -> String {
        format!("/topic/quiz/{}/teams", self.quiz_id)
    }

    /// Host-only submission notifications.
    pub fn host(&self) -> String {
        format!("/topic/quiz/{}/host", self.quiz_id)
    }

    pub fn command(&self) -> String {
        format!("/app/quiz/{}/command", self.quiz_id)
    }

    pub fn submit(&self) -> String {
        format!("/app/quiz/{}/submit", self.quiz_id)
    }
}

#[cfg(test)]
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

    #[test]
    fn config_defaults() {
        let config = QuizClientConfig::new("ws://x");
        assert_eq!(config.url, "ws://x");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.heartbeat_incoming, Duration::from_secs(10));
        assert_eq!(config.heartbeat_outgoing, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn reconnect_delay_is_clamped_by_max() {
        let config = QuizClientConfig::new("ws://x")
            .with_max_reconnect_delay(Duration::from_secs(3))
            .with_reconnect_delay(Duration::from_secs(60));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));

        let config = QuizClientConfig::new("ws://x").with_max_reconnect_delay(Duration::from_secs(1));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn attempts_and_capacity_are_clamped_to_one() {
        let config = QuizClientConfig::new("ws://x")
            .with_max_reconnect_attempts(0)
            .with_event_channel_capacity(0);
        assert_eq!(config.max_reconnect_attempts, 1);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn endpoints_embed_quiz_id() {
        let ep = Endpoints::new(42);
        assert_eq!(ep.state(), "/topic/quiz/42/state");
        assert_eq!(ep.timer(), "/topic/quiz/42/timer");
        assert_eq!(ep.teams(), "/topic/quiz/42/teams");
        assert_eq!(ep.host(), "/topic/quiz/42/host");
        assert_eq!(ep.command(), "/app/quiz/42/command");
        assert_eq!(ep.submit(), "/app/quiz/42/submit");
        assert_eq!(Endpoints::ERRORS, "/user/queue/errors");
    }
}
