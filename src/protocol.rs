//! Wire-compatible JSON bodies exchanged over the quiz broker.
//!
//! Field names are camelCase and enum tags are `SCREAMING_SNAKE_CASE`, matching
//! the server's message classes. Inbound bodies are deliberately loose (almost
//! every field optional); [`decoder`](crate::decoder) turns them into fully
//! populated events.

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Identifier of a quiz.
pub type QuizId = i64;

/// Identifier of a team.
pub type TeamId = i64;

/// Identifier of a question.
pub type QuestionId = i64;

// ── Enums ───────────────────────────────────────────────────────────

/// Role of the local client within a quiz session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// The proctor driving quiz progression.
    #[serde(alias = "PROCTOR")]
    Host,
    /// A team answering questions.
    Participant,
}

/// Host control commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    StartRound,
    NextQuestion,
    ViewLeaderboard,
    StartTiebreaker,
    EndQuiz,
    Pause,
    Resume,
}

/// Presence change carried on the teams topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamConnectionKind {
    TeamConnected,
    TeamDisconnected,
}

/// Tag of an answer submission body. Only one value exists on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionKind {
    #[default]
    SubmitAnswer,
}

// ── Inbound bodies ──────────────────────────────────────────────────

/// A question as broadcast by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    /// Seconds allowed to answer.
    pub time_limit: u32,
    pub points: u32,
    /// Only legitimately present from the answer-reveal phase onwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

/// One row of the server's ranking list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    /// Server-computed rank; recomputed locally before display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub team_id: TeamId,
    #[serde(default)]
    pub team_name: String,
    pub score: i64,
}

/// Body of the quiz-wide state topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateMessage {
    /// Raw phase name, possibly a legacy alias.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<QuizId>,
    /// Zero-based index of the current question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionData>,
    /// One-based question number, used when the index is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rankings: Option<Vec<RankingEntry>>,
}

/// Body of the timer topic. Negative values mean the time is up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerMessage {
    pub time_remaining: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<i64>,
}

/// Body of the teams topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamConnectionMessage {
    #[serde(rename = "type")]
    pub kind: TeamConnectionKind,
    pub team_id: TeamId,
    #[serde(default)]
    pub team_name: String,
}

/// Body of the host-only submissions topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionNotification {
    pub team_id: TeamId,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub timestamp: String,
}

// ── Outbound bodies ─────────────────────────────────────────────────

/// A host control command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandMessage {
    #[serde(rename = "type")]
    pub kind: CommandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CommandMessage {
    /// A command without payload.
    pub fn new(kind: CommandType) -> Self {
        Self {
            kind,
            payload: None,
        }
    }
}

/// A participant's answer, stamped at send time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmissionMessage {
    #[serde(rename = "type")]
    pub kind: SubmissionKind,
    pub team_id: TeamId,
    pub question_id: QuestionId,
    pub selected_option: String,
    /// RFC 3339 timestamp taken immediately before the frame is written.
    pub timestamp: String,
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
    fn role_accepts_proctor_alias() {
        let role: Role = serde_json::from_str("\"PROCTOR\"").unwrap();
        assert_eq!(role, Role::Host);
        assert_eq!(serde_json::to_string(&Role::Host).unwrap(), "\"HOST\"");
    }

    #[test]
    fn command_message_wire_shape() {
        let mut payload = serde_json::Map::new();
        payload.insert("round".into(), "EASY".into());
        let msg = CommandMessage {
            kind: CommandType::StartRound,
            payload: Some(payload),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "START_ROUND", "payload": { "round": "EASY" } })
        );
        let bare = serde_json::to_value(CommandMessage::new(CommandType::Pause)).unwrap();
        assert_eq!(bare, serde_json::json!({ "type": "PAUSE" }));
    }

    #[test]
    fn answer_submission_wire_shape() {
        let msg = AnswerSubmissionMessage {
            kind: SubmissionKind::SubmitAnswer,
            team_id: 3,
            question_id: 11,
            selected_option: "B".into(),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "SUBMIT_ANSWER");
        assert_eq!(json["teamId"], 3);
        assert_eq!(json["questionId"], 11);
        assert_eq!(json["selectedOption"], "B");
    }

    #[test]
    fn game_state_message_tolerates_sparse_bodies() {
        let msg: GameStateMessage = serde_json::from_str(r#"{"state":"LOBBY"}"#).unwrap();
        assert_eq!(msg.state, "LOBBY");
        assert!(msg.current_question.is_none());
        assert!(msg.rankings.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let msg: TimerMessage =
            serde_json::from_str(r#"{"type":"TIMER_UPDATE","timeRemaining":12,"totalTime":30}"#)
                .unwrap();
        assert_eq!(msg.time_remaining, 12);
        assert_eq!(msg.total_time, Some(30));
    }
}
