//! Async realtime client for a live quiz.
//!
//! [`QuizClient`] is a thin handle around a background connection supervisor.
//! The supervisor opens a transport through a [`Connector`], performs the STOMP
//! handshake, subscribes to the quiz channels, and forwards decoded broadcasts
//! as [`ClientEvent`]s on a bounded channel returned from [`QuizClient::new`].
//! When the connection fails it retries on a fixed delay up to a configured
//! number of consecutive attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new(QuizClientConfig::from_env().url.clone());
//! let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::from_env());
//!
//! client.connect(ConnectParams::new(42, Role::Host).with_access_code("1234"));
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Connected => client.send_command(HostCommand::start_round("EASY"))?,
//!         ClientEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::commands::{AnswerSubmission, HostCommand};
use crate::config::{Endpoints, QuizClientConfig};
use crate::decoder::{self, Channel};
use crate::error::{QuizClientError, Result};
use crate::event::{ClientEvent, GameEvent};
use crate::protocol::{QuizId, Role, TeamId};
use crate::session::Session;
use crate::stomp::{self, Frame, Heartbeat, StompCommand, HEARTBEAT};
use crate::transport::{Connector, Transport};

/// Shortest outgoing heartbeat period the ticker accepts.
const MIN_TICK: Duration = Duration::from_millis(1);

// ── Connection parameters ───────────────────────────────────────────

/// Who is connecting to which quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub quiz_id: QuizId,
    pub role: Role,
    /// Sent as the `accessCode` CONNECT header.
    pub access_code: Option<String>,
    /// The participant's team. Only used for log context.
    pub team_id: Option<TeamId>,
    pub display_name: Option<String>,
}

impl ConnectParams {
    pub fn new(quiz_id: QuizId, role: Role) -> Self {
        Self {
            quiz_id,
            role,
            access_code: None,
            team_id: None,
            display_name: None,
        }
    }

    /// Parameters for the identity stored in `session`.
    pub fn from_session(session: &Session) -> Self {
        Self {
            quiz_id: session.quiz_id(),
            role: session.role(),
            access_code: Some(session.access_code().to_string()),
            team_id: session.team_id(),
            display_name: Some(session.display_name().to_string()),
        }
    }

    #[must_use]
    pub fn with_access_code(mut self, access_code: impl Into<String>) -> Self {
        self.access_code = Some(access_code.into());
        self
    }

    #[must_use]
    pub fn with_team_id(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Channels this role listens on, in subscription order.
    pub fn channels(&self) -> &'static [Channel] {
        match self.role {
            Role::Host => &[
                Channel::State,
                Channel::Timer,
                Channel::Teams,
                Channel::Errors,
                Channel::Host,
            ],
            Role::Participant => &[Channel::State, Channel::Timer, Channel::Teams, Channel::Errors],
        }
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Flags shared between the client handle and the supervisor task.
struct ClientState {
    connected: AtomicBool,
    connecting: AtomicBool,
    attempts: AtomicU32,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    fn reset(&self) {
        self.connected.store(false, Ordering::Release);
        self.connecting.store(false, Ordering::Release);
        self.attempts.store(0, Ordering::Release);
    }
}

/// Frames queued by the handle for the supervisor.
#[derive(Debug)]
enum Outbound {
    Command(HostCommand),
    Submit(AnswerSubmission),
}

/// How the supervisor was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Tear down and report `Disconnected`.
    Disconnect,
    /// Tear down silently; a new supervisor takes over.
    Restart,
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for one quiz connection.
///
/// Created via [`QuizClient::new`]; nothing connects until
/// [`connect`](Self::connect). The event receiver stays valid across
/// [`disconnect`](Self::disconnect) and [`reconnect`](Self::reconnect).
pub struct QuizClient<C: Connector> {
    connector: Arc<C>,
    config: QuizClientConfig,
    params: Option<ConnectParams>,
    client_id: Uuid,
    event_tx: mpsc::Sender<ClientEvent>,
    cmd_tx: Option<mpsc::UnboundedSender<Outbound>>,
    state: Arc<ClientState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<Stop>>,
}

impl<C: Connector> QuizClient<C> {
    /// Create a client and the receiver its events are delivered on.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn new(connector: C, config: QuizClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let client = Self {
            connector: Arc::new(connector),
            config,
            params: None,
            client_id: Uuid::new_v4(),
            event_tx,
            cmd_tx: None,
            state: Arc::new(ClientState::new()),
            task: None,
            shutdown_tx: None,
        };
        (client, event_rx)
    }

    /// Start connecting. A no-op while a connection (or retry cycle) is active.
    pub fn connect(&mut self, params: ConnectParams) {
        if self.is_running() {
            debug!(quiz_id = params.quiz_id, "connect ignored: already running");
            return;
        }
        info!(quiz_id = params.quiz_id, role = ?params.role, "connecting");
        self.state.reset();
        self.spawn_supervisor(params, Duration::ZERO);
    }

    /// Tear down the connection: unsubscribe, close, and emit `Disconnected`.
    ///
    /// Connection flags return to their initial values. The session is
    /// untouched.
    pub async fn disconnect(&mut self) {
        debug!("disconnect requested");
        self.stop_supervisor(Stop::Disconnect).await;
        self.state.reset();
    }

    /// Drop the current connection and start over after a short fixed delay
    /// with a fresh attempt counter.
    ///
    /// Repeated calls replace the pending attempt rather than stacking up.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::NotConnected`] if [`connect`](Self::connect)
    /// was never called.
    pub async fn reconnect(&mut self) -> Result<()> {
        let params = self.params.clone().ok_or(QuizClientError::NotConnected)?;
        info!(quiz_id = params.quiz_id, "manual reconnect");
        self.stop_supervisor(Stop::Restart).await;
        self.state.reset();
        self.spawn_supervisor(params, self.config.manual_reconnect_delay);
        Ok(())
    }

    /// Publish a host control command.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::NotConnected`] when there is no live
    /// connection. Nothing is queued for later.
    pub fn send_command(&self, command: HostCommand) -> Result<()> {
        let kind = command.kind();
        self.send(Outbound::Command(command)).inspect_err(|_| {
            warn!(command = ?kind, "host command dropped: not connected");
        })
    }

    /// Publish an answer submission, stamped when it leaves the client.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::NotConnected`] when there is no live
    /// connection. Nothing is queued for later.
    pub fn submit_answer(&self, submission: AnswerSubmission) -> Result<()> {
        let question_id = submission.question_id;
        self.send(Outbound::Submit(submission)).inspect_err(|_| {
            error!(question_id, "answer submission dropped: not connected");
        })
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Handshake done and all channels subscribed.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    pub fn is_connecting(&self) -> bool {
        self.state.connecting.load(Ordering::Acquire)
    }

    /// Consecutive failures since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::Acquire)
    }

    /// Whether a supervisor task is alive (connected, connecting, or waiting to retry).
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Identifier attached to this client's log spans.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn params(&self) -> Option<&ConnectParams> {
        self.params.as_ref()
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send(&self, outbound: Outbound) -> Result<()> {
        if !self.is_connected() {
            return Err(QuizClientError::NotConnected);
        }
        self.cmd_tx
            .as_ref()
            .ok_or(QuizClientError::NotConnected)?
            .send(outbound)
            .map_err(|_| QuizClientError::NotConnected)
    }

    fn spawn_supervisor(&mut self, params: ConnectParams, initial_delay: Duration) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Outbound>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<Stop>();

        let span = info_span!(
            "quiz_client",
            client_id = %self.client_id,
            quiz_id = params.quiz_id,
            role = ?params.role,
        );
        let supervisor = Supervisor {
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            endpoints: Endpoints::new(params.quiz_id),
            params: params.clone(),
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            shutdown_rx,
        };
        self.task = Some(tokio::spawn(supervisor.run(initial_delay).instrument(span)));
        self.cmd_tx = Some(cmd_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.params = Some(params);
    }

    async fn stop_supervisor(&mut self, stop: Stop) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(stop);
        }

        let Some(mut task) = self.task.take() else {
            self.cmd_tx = None;
            return;
        };
        match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                warn!("connection supervisor terminated with join error: {join_err}");
            }
            Err(_) => {
                warn!("connection supervisor did not exit within timeout; aborting task");
                task.abort();
                if let Err(join_err) = task.await {
                    debug!("connection supervisor aborted: {join_err}");
                }
                if stop == Stop::Disconnect {
                    let event = ClientEvent::Disconnected {
                        reason: Some("client disconnected".into()),
                    };
                    if self.event_tx.try_send(event).is_err() {
                        debug!("could not report disconnect: event channel full or closed");
                    }
                }
            }
        }
        // Dropped last so the supervisor never mistakes a restart for a handle drop.
        self.cmd_tx = None;
    }
}

impl<C: Connector> std::fmt::Debug for QuizClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizClient")
            .field("client_id", &self.client_id)
            .field("connected", &self.is_connected())
            .field("connecting", &self.is_connecting())
            .field("attempts", &self.reconnect_attempts())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl<C: Connector> Drop for QuizClient<C> {
    fn drop(&mut self) {
        // No executor to drive a graceful teardown here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

/// One active subscription.
#[derive(Debug)]
struct Subscription {
    id: String,
    destination: String,
    channel: Channel,
}

struct Supervisor<C: Connector> {
    connector: Arc<C>,
    config: QuizClientConfig,
    endpoints: Endpoints,
    params: ConnectParams,
    state: Arc<ClientState>,
    event_tx: mpsc::Sender<ClientEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Outbound>,
    shutdown_rx: oneshot::Receiver<Stop>,
}

impl<C: Connector> Supervisor<C> {
    /// Connect, serve, and retry until stopped or out of attempts.
    async fn run(mut self, initial_delay: Duration) {
        debug!("connection supervisor started");

        if !initial_delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(initial_delay) => {}
                stop = &mut self.shutdown_rx => {
                    self.finish(stop.unwrap_or(Stop::Disconnect), Some("client disconnected".into())).await;
                    return;
                }
            }
        }

        loop {
            self.drain_stale_commands();
            let attempt = self.state.attempts.load(Ordering::Acquire);
            self.state.connecting.store(true, Ordering::Release);
            emit(&self.event_tx, ClientEvent::Connecting { attempt }).await;

            let err = match self.connect_and_serve().await {
                Ok(stop) => {
                    self.finish(stop, Some("client disconnected".into())).await;
                    return;
                }
                Err(e) => e,
            };

            self.state.connected.store(false, Ordering::Release);
            let attempts = self
                .state
                .attempts
                .fetch_add(1, Ordering::AcqRel)
                .saturating_add(1);
            let terminal = attempts >= self.config.max_reconnect_attempts;

            if terminal {
                let message = format!("failed to connect after {attempts} attempts: {err}");
                error!(attempts, error = %err, "giving up on connection");
                emit(
                    &self.event_tx,
                    ClientEvent::ConnectionError {
                        message: message.clone(),
                        attempts,
                        terminal,
                    },
                )
                .await;
                self.finish(Stop::Disconnect, Some(message)).await;
                return;
            }

            let delay = self
                .config
                .reconnect_delay
                .min(self.config.max_reconnect_delay);
            warn!(attempts, error = %err, retry_in = ?delay, "connection failed");
            emit(
                &self.event_tx,
                ClientEvent::ConnectionError {
                    message: err.to_string(),
                    attempts,
                    terminal,
                },
            )
            .await;

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                stop = &mut self.shutdown_rx => {
                    self.finish(stop.unwrap_or(Stop::Disconnect), Some("client disconnected".into())).await;
                    return;
                }
            }
        }
    }

    /// Clear flags and, unless restarting, report the final `Disconnected`.
    async fn finish(&self, stop: Stop, reason: Option<String>) {
        self.state.connected.store(false, Ordering::Release);
        self.state.connecting.store(false, Ordering::Release);
        if stop == Stop::Disconnect {
            emit(&self.event_tx, ClientEvent::Disconnected { reason }).await;
        }
        debug!(?stop, "connection supervisor exited");
    }

    /// Anything still queued was accepted for a connection that no longer exists.
    fn drain_stale_commands(&mut self) {
        while let Ok(outbound) = self.cmd_rx.try_recv() {
            warn!(?outbound, "discarding frame queued for a lost connection");
        }
    }

    /// One connection lifetime. `Ok` means a requested stop, `Err` a failure to retry.
    async fn connect_and_serve(&mut self) -> Result<Stop> {
        let connector = &self.connector;
        let config = &self.config;
        let access_code = self.params.access_code.as_deref();
        let opening = async {
            let mut transport = connector.connect().await?;
            let heartbeat = handshake(&mut transport, config, access_code).await?;
            Ok::<_, QuizClientError>((transport, heartbeat))
        };

        let (mut transport, heartbeat) = tokio::select! {
            opened = tokio::time::timeout(config.connect_timeout, opening) => {
                opened.map_err(|_| QuizClientError::Timeout)??
            }
            stop = &mut self.shutdown_rx => return Ok(stop.unwrap_or(Stop::Disconnect)),
        };

        let subscriptions = match self.subscribe_all(&mut transport).await {
            Ok(subs) => subs,
            Err(e) => {
                let _ = transport.close().await;
                return Err(e);
            }
        };

        self.state.attempts.store(0, Ordering::Release);
        self.state.connecting.store(false, Ordering::Release);
        self.state.connected.store(true, Ordering::Release);
        info!(
            subscriptions = subscriptions.len(),
            heartbeat_out = ?heartbeat.outgoing,
            heartbeat_in = ?heartbeat.incoming,
            "connected"
        );
        emit(&self.event_tx, ClientEvent::Connected).await;

        let outcome = self.serve(&mut transport, &subscriptions, heartbeat).await;
        match outcome {
            Ok(_) => teardown(&mut transport, &subscriptions).await,
            Err(_) => {
                if let Err(e) = transport.close().await {
                    debug!("close after failure: {e}");
                }
            }
        }
        outcome
    }

    async fn subscribe_all(&self, transport: &mut C::Transport) -> Result<Vec<Subscription>> {
        let mut subscriptions = Vec::new();
        for (n, channel) in self.params.channels().iter().enumerate() {
            let destination = self.destination(*channel);
            let id = format!("sub-{n}");
            let frame = Frame::new(StompCommand::Subscribe)
                .with_header("id", &id)
                .with_header("destination", &destination)
                .with_header("ack", "auto");
            transport.send(frame.encode()).await?;
            debug!(%id, %destination, "subscribed");
            subscriptions.push(Subscription {
                id,
                destination,
                channel: *channel,
            });
        }
        Ok(subscriptions)
    }

    fn destination(&self, channel: Channel) -> String {
        match channel {
            Channel::State => self.endpoints.state(),
            Channel::Timer => self.endpoints.timer(),
            Channel::Teams => self.endpoints.teams(),
            Channel::Host => self.endpoints.host(),
            Channel::Errors => Endpoints::ERRORS.to_string(),
        }
    }

    async fn serve(
        &mut self,
        transport: &mut C::Transport,
        subscriptions: &[Subscription],
        heartbeat: Heartbeat,
    ) -> Result<Stop> {
        let send_heartbeats = !heartbeat.outgoing.is_zero();
        let period = heartbeat.outgoing.max(MIN_TICK);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let window = heartbeat.incoming.saturating_mul(2);
        let mut deadline = Instant::now() + window;

        loop {
            tokio::select! {
                stop = &mut self.shutdown_rx => {
                    return Ok(stop.unwrap_or(Stop::Disconnect));
                }

                outbound = self.cmd_rx.recv() => match outbound {
                    Some(outbound) => self.send_outbound(transport, outbound).await?,
                    // Every sender is gone, so the handle is being torn down.
                    None => return Ok(Stop::Disconnect),
                },

                incoming = transport.recv() => match incoming {
                    Some(Ok(text)) => {
                        self.dispatch_inbound(&text, subscriptions).await?;
                        // Waiting on a full event channel is not broker silence.
                        deadline = Instant::now() + window;
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(QuizClientError::TransportClosed),
                },

                _ = ticker.tick(), if send_heartbeats => {
                    transport.send(HEARTBEAT.to_string()).await?;
                }

                () = tokio::time::sleep_until(deadline), if !window.is_zero() => {
                    return Err(QuizClientError::HeartbeatTimeout(window));
                }
            }
        }
    }

    async fn send_outbound(&self, transport: &mut C::Transport, outbound: Outbound) -> Result<()> {
        let (destination, body) = match outbound {
            Outbound::Command(command) => {
                info!(command = ?command.kind(), "dispatching host command");
                (
                    self.endpoints.command(),
                    serde_json::to_string(&command.to_message()),
                )
            }
            Outbound::Submit(submission) => {
                info!(
                    question_id = submission.question_id,
                    team_id = submission.team_id,
                    "submitting answer"
                );
                (
                    self.endpoints.submit(),
                    serde_json::to_string(&submission.into_message(Utc::now())),
                )
            }
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                error!(%destination, "failed to serialize outbound body: {e}");
                return Ok(());
            }
        };
        let frame = Frame::new(StompCommand::Send)
            .with_header("destination", &destination)
            .with_header("content-type", "application/json")
            .with_body(body);
        debug!(%destination, "sending frame");
        transport.send(frame.encode()).await
    }

    async fn dispatch_inbound(&self, text: &str, subscriptions: &[Subscription]) -> Result<()> {
        let frames = match stomp::parse_message(text) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("dropping unparseable STOMP message: {e}");
                return Ok(());
            }
        };

        for frame in frames {
            match frame.command {
                StompCommand::Message => self.deliver(&frame, subscriptions).await,
                StompCommand::Error => return Err(server_error(&frame)),
                StompCommand::Receipt => debug!(receipt = ?frame.header("receipt-id"), "receipt"),
                other => debug!(command = %other, "ignoring unexpected frame"),
            }
        }
        Ok(())
    }

    async fn deliver(&self, frame: &Frame, subscriptions: &[Subscription]) {
        let by_id = frame
            .header("subscription")
            .and_then(|id| subscriptions.iter().find(|s| s.id == id));
        let route = by_id.or_else(|| {
            frame
                .header("destination")
                .and_then(|d| subscriptions.iter().find(|s| s.destination == d))
        });
        let Some(subscription) = route else {
            warn!(
                subscription = ?frame.header("subscription"),
                destination = ?frame.header("destination"),
                "message for unknown subscription"
            );
            return;
        };

        match decoder::decode(subscription.channel, &frame.body) {
            Ok(event @ GameEvent::TimerUpdate(_)) => {
                emit_lossy(&self.event_tx, ClientEvent::Game(event));
            }
            Ok(event) => emit(&self.event_tx, ClientEvent::Game(event)).await,
            Err(e) => {
                warn!(
                    destination = %subscription.destination,
                    "dropping undecodable message: {e}"
                );
            }
        }
    }
}

// ── STOMP session helpers ───────────────────────────────────────────

/// Send CONNECT and wait for CONNECTED.
async fn handshake<T: Transport>(
    transport: &mut T,
    config: &QuizClientConfig,
    access_code: Option<&str>,
) -> Result<Heartbeat> {
    let mut connect = Frame::new(StompCommand::Connect)
        .with_header("accept-version", "1.2")
        .with_header("host", host_header(&config.url))
        .with_header(
            "heart-beat",
            stomp::heartbeat_header(config.heartbeat_outgoing, config.heartbeat_incoming),
        );
    if let Some(code) = access_code {
        connect = connect.with_header("accessCode", code);
    }
    transport.send(connect.encode()).await?;

    loop {
        let text = match transport.recv().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => return Err(QuizClientError::TransportClosed),
        };
        for frame in stomp::parse_message(&text)? {
            match frame.command {
                StompCommand::Connected => {
                    return Ok(Heartbeat::negotiate(
                        config.heartbeat_outgoing,
                        config.heartbeat_incoming,
                        frame.header("heart-beat"),
                    ));
                }
                StompCommand::Error => return Err(server_error(&frame)),
                other => debug!(command = %other, "ignoring frame before CONNECTED"),
            }
        }
    }
}

/// Best-effort UNSUBSCRIBE, DISCONNECT, close.
async fn teardown<T: Transport>(transport: &mut T, subscriptions: &[Subscription]) {
    for sub in subscriptions {
        let frame = Frame::new(StompCommand::Unsubscribe).with_header("id", &sub.id);
        if let Err(e) = transport.send(frame.encode()).await {
            debug!("unsubscribe {} failed: {e}", sub.id);
            break;
        }
    }
    let _ = transport
        .send(Frame::new(StompCommand::Disconnect).encode())
        .await;
    if let Err(e) = transport.close().await {
        debug!("transport close failed: {e}");
    }
}

fn server_error(frame: &Frame) -> QuizClientError {
    let message = frame
        .header("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.trim().to_string());
    QuizClientError::ServerError { message }
}

/// Authority part of a WebSocket URL, used as the STOMP virtual host.
fn host_header(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

/// Deliver an event, waiting for channel capacity.
async fn emit(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

/// Deliver an event only if there is room. Timer ticks are superseded by the
/// next one, so losing one under backpressure is harmless.
fn emit_lossy(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replies CONNECTED to CONNECT, then replays scripted messages.
    struct ScriptedTransport {
        incoming: VecDeque<Option<Result<String>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, frame: String) -> Result<()> {
            if frame.starts_with("CONNECT\n") {
                self.incoming
                    .push_front(Some(Ok("CONNECTED\nversion:1.2\n\n\0".into())));
            }
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct ScriptedConnector {
        script: StdMutex<Vec<Option<Result<String>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self) -> Result<ScriptedTransport> {
            let incoming = std::mem::take(&mut *self.script.lock().unwrap());
            Ok(ScriptedTransport {
                incoming: incoming.into(),
                sent: Arc::clone(&self.sent),
            })
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self) -> Result<ScriptedTransport> {
            Err(QuizClientError::TransportSend("connection refused".into()))
        }
    }

    fn scripted(
        script: Vec<Option<Result<String>>>,
    ) -> (ScriptedConnector, Arc<StdMutex<Vec<String>>>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let connector = ScriptedConnector {
            script: StdMutex::new(script),
            sent: Arc::clone(&sent),
        };
        (connector, sent)
    }

    fn message(subscription: &str, body: &str) -> String {
        Frame::new(StompCommand::Message)
            .with_header("subscription", subscription)
            .with_header("destination", "/topic/whatever")
            .with_body(body)
            .encode()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn host_header_strips_scheme_and_path() {
        assert_eq!(
            host_header("ws://localhost:8090/ws/quiz/websocket"),
            "localhost:8090"
        );
        assert_eq!(host_header("wss://quiz.example.org?x=1"), "quiz.example.org");
        assert_eq!(host_header("broker"), "broker");
    }

    #[test]
    fn host_role_listens_on_submissions() {
        let host = ConnectParams::new(1, Role::Host);
        let team = ConnectParams::new(1, Role::Participant);
        assert!(host.channels().contains(&Channel::Host));
        assert!(!team.channels().contains(&Channel::Host));
        assert_eq!(team.channels().len(), 4);
    }

    #[tokio::test]
    async fn sends_fail_before_connect() {
        let (client, _events) = QuizClient::new(RefusingConnector, QuizClientConfig::default());
        assert!(matches!(
            client.send_command(HostCommand::Pause),
            Err(QuizClientError::NotConnected)
        ));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn reconnect_requires_prior_connect() {
        let (mut client, _events) =
            QuizClient::new(RefusingConnector, QuizClientConfig::default());
        assert!(matches!(
            client.reconnect().await,
            Err(QuizClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn handshake_carries_access_code_and_subscribes() {
        let (connector, sent) = scripted(vec![]);
        let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
        client.connect(ConnectParams::new(7, Role::Participant).with_access_code("TEAM7"));

        assert_eq!(
            events.recv().await.unwrap(),
            ClientEvent::Connecting { attempt: 0 }
        );
        assert_eq!(events.recv().await.unwrap(), ClientEvent::Connected);
        assert!(client.is_connected());

        {
            let frames = sent.lock().unwrap();
            let connect = &stomp::parse_message(&frames[0]).unwrap()[0];
            assert_eq!(connect.command, StompCommand::Connect);
            assert_eq!(connect.header("accessCode"), Some("TEAM7"));
            assert_eq!(connect.header("accept-version"), Some("1.2"));
            assert_eq!(frames.len(), 5);
        }

        client.disconnect().await;
        assert_eq!(
            events.recv().await.unwrap(),
            ClientEvent::Disconnected {
                reason: Some("client disconnected".into())
            }
        );
    }

    #[tokio::test]
    async fn routes_messages_by_subscription() {
        let (connector, _sent) = scripted(vec![
            Some(Ok(message("sub-1", r#"{"timeRemaining": 12}"#))),
            Some(Ok(message("sub-0", r#"{"state": "LOBBY"}"#))),
        ]);
        let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
        client.connect(ConnectParams::new(7, Role::Host));

        let _ = events.recv().await; // Connecting
        let _ = events.recv().await; // Connected
        assert!(matches!(
            events.recv().await.unwrap(),
            ClientEvent::Game(GameEvent::TimerUpdate(t)) if t.time_remaining == 12
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            ClientEvent::Game(GameEvent::StateUpdate(_))
        ));

        client.disconnect().await;
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (connector, _sent) = scripted(vec![]);
        let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
        client.connect(ConnectParams::new(1, Role::Host));
        let _ = events.recv().await;
        let _ = events.recv().await;
        client.connect(ConnectParams::new(2, Role::Host));
        assert_eq!(client.params().unwrap().quiz_id, 1);
        client.disconnect().await;
    }
}
