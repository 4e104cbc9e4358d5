//! Typed events produced by the client.
//!
//! [`ClientEvent`] is what the background connection task emits: connection
//! lifecycle changes plus decoded [`GameEvent`]s. The reducer in
//! [`view`](crate::view) folds them into a [`GameView`](crate::view::GameView).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::GamePhase;
use crate::protocol::{QuestionData, RankingEntry, TeamId};

/// A fully-populated state broadcast.
///
/// Every optional wire field has already been defaulted, so consumers never
/// distinguish "missing" from "explicitly empty". Serializes back to the
/// state-topic wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    #[serde(rename = "state")]
    pub phase: GamePhase,
    /// One-based; 0 before the first question. `None` when the broadcast
    /// named no question, which leaves the current number in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_number: Option<u32>,
    pub total_questions: u32,
    /// Seconds, already clamped at zero.
    pub time_remaining: u32,
    pub current_question: Option<QuestionData>,
    pub rankings: Vec<RankingEntry>,
    pub current_round: Option<String>,
    pub message: Option<String>,
}

impl StateUpdate {
    /// An update naming only a phase, every other field at its zero value.
    pub fn new(phase: GamePhase) -> Self {
        Self {
            phase,
            question_number: None,
            total_questions: 0,
            time_remaining: 0,
            current_question: None,
            rankings: Vec::new(),
            current_round: None,
            message: None,
        }
    }
}

/// A server timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerUpdate {
    /// Seconds, clamped at zero.
    pub time_remaining: u32,
    /// Full duration of the running phase, when the server sent it.
    pub total_time: Option<u32>,
}

/// A team currently connected to the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPresence {
    pub id: TeamId,
    pub name: String,
    /// Local receipt time of the connect notification.
    pub connected_at: DateTime<Utc>,
}

/// A host-side record that a team answered the current question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub team_id: TeamId,
    pub team_name: String,
    pub timestamp: String,
}

/// A decoded broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    StateUpdate(Box<StateUpdate>),
    TimerUpdate(TimerUpdate),
    TeamConnected(TeamPresence),
    TeamDisconnected { team_id: TeamId },
    /// Host subscribers only.
    SubmissionReceived(SubmissionRecord),
    /// Verbatim text from the private error queue.
    ErrorNotice(String),
}

/// Everything the connection task reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection attempt started. `attempt` counts failures since the last success.
    Connecting { attempt: u32 },
    /// Handshake finished and all channels are subscribed.
    Connected,
    /// A connectivity failure. When `terminal`, automatic retry has stopped and
    /// only a manual reconnect can recover.
    ConnectionError {
        message: String,
        attempts: u32,
        terminal: bool,
    },
    /// The connection task exited. Always the last event on the channel.
    Disconnected { reason: Option<String> },
    /// A decoded broadcast.
    Game(GameEvent),
}
