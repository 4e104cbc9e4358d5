//! One game session from a single client's point of view.
//!
//! [`QuizSession`] ties a [`QuizClient`] to the [`GameView`] it feeds and the
//! [`Navigator`] that follows the phase. Screens read the view and call the
//! three interaction methods; everything else arrives through
//! [`next_event`](QuizSession::next_event).

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{ConnectParams, QuizClient};
use crate::commands::HostCommand;
use crate::config::QuizClientConfig;
use crate::event::{ClientEvent, GameEvent};
use crate::navigation::{Navigator, Screen};
use crate::session::Session;
use crate::transport::Connector;
use crate::view::{GameView, Rejection};

/// What one call to [`QuizSession::next_event`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    /// The event that was applied to the view.
    pub event: ClientEvent,
    /// Set when the phase moved the client to another screen.
    pub navigate_to: Option<Screen>,
}

/// A connected client with its view state.
pub struct QuizSession<C: Connector> {
    client: QuizClient<C>,
    events: Option<mpsc::Receiver<ClientEvent>>,
    view: GameView,
    navigator: Navigator,
    session: Session,
}

impl<C: Connector> QuizSession<C> {
    /// Connect as the identity in `session`, starting from a fresh view on the
    /// lobby screen.
    pub fn start(connector: C, config: QuizClientConfig, session: Session) -> Self {
        let (mut client, events) = QuizClient::new(connector, config);
        client.connect(ConnectParams::from_session(&session));
        info!(
            quiz_id = session.quiz_id(),
            role = ?session.role(),
            name = session.display_name(),
            "session started"
        );
        Self {
            client,
            events: Some(events),
            view: GameView::new(),
            navigator: Navigator::new(session.role()),
            session,
        }
    }

    /// Wait for the next event, fold it into the view, and report navigation.
    ///
    /// Returns `None` once the session is disconnected.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let event = self.events.as_mut()?.recv().await?;
        self.view.apply(event.clone());

        let navigate_to = match &event {
            ClientEvent::Game(GameEvent::StateUpdate(_)) => {
                self.navigator.on_phase(self.view.phase())
            }
            ClientEvent::Connecting { .. } => {
                self.navigator = Navigator::new(self.session.role());
                None
            }
            _ => None,
        };
        if let Some(screen) = navigate_to {
            debug!(route = screen.route(self.session.role()), "navigating");
        }
        Some(SessionUpdate { event, navigate_to })
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    pub fn screen(&self) -> Screen {
        self.navigator.current()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &QuizClient<C> {
        &self.client
    }

    /// Highlight an option for the current question.
    ///
    /// # Errors
    ///
    /// See [`GameView::select_option`].
    pub fn select_option(&mut self, option: &str) -> Result<(), Rejection> {
        self.view.select_option(option)
    }

    /// Submit the selected option.
    ///
    /// The view locks the answer even when the connection is down; the
    /// dropped publish is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::NotParticipant`] for host sessions, otherwise see
    /// [`GameView::submit`].
    pub fn submit(&mut self) -> Result<(), Rejection> {
        let team_id = self.session.team_id().ok_or(Rejection::NotParticipant)?;
        let submission = self.view.submit(team_id)?;
        let _ = self.client.submit_answer(submission);
        Ok(())
    }

    /// Publish a host command. Dropped (and logged) while disconnected.
    pub fn send_command(&self, command: HostCommand) {
        let _ = self.client.send_command(command);
    }

    /// Drop the connection and retry promptly with a fresh attempt budget.
    /// The view and screen start over; the next state broadcast restores them.
    pub async fn reconnect(&mut self) {
        if self.client.reconnect().await.is_ok() {
            self.view = GameView::new();
            self.navigator = Navigator::new(self.session.role());
        }
    }

    /// Close the connection. The stored session is not cleared; later
    /// [`next_event`](Self::next_event) calls return `None`.
    pub async fn disconnect(&mut self) {
        self.client.disconnect().await;
        self.events = None;
        self.view.reset_connection();
        info!(quiz_id = self.session.quiz_id(), "session disconnected");
    }
}

impl<C: Connector> std::fmt::Debug for QuizSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("role", &self.session.role())
            .field("quiz_id", &self.session.quiz_id())
            .field("phase", &self.view.phase())
            .field("screen", &self.navigator.current())
            .finish()
    }
}
