//! Host control commands and participant answer submissions.
//!
//! The dispatch layer does not check phase legality itself. Screens should
//! only enable the commands returned by [`available_commands`].

use chrono::{DateTime, SecondsFormat, Utc};

use crate::phase::GamePhase;
use crate::protocol::{
    AnswerSubmissionMessage, CommandMessage, CommandType, QuestionId, SubmissionKind, TeamId,
};

/// Round name sent with `START_ROUND` when the host does not pick one.
pub const DEFAULT_ROUND: &str = "EASY";

/// A host control action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Pause,
    Resume,
    StartRound { round: String },
    ViewLeaderboard,
    NextQuestion,
    EndQuiz,
    StartTiebreaker,
}

impl HostCommand {
    /// `START_ROUND` for the given round.
    pub fn start_round(round: impl Into<String>) -> Self {
        Self::StartRound {
            round: round.into(),
        }
    }

    pub fn kind(&self) -> CommandType {
        match self {
            Self::Pause => CommandType::Pause,
            Self::Resume => CommandType::Resume,
            Self::StartRound { .. } => CommandType::StartRound,
            Self::ViewLeaderboard => CommandType::ViewLeaderboard,
            Self::NextQuestion => CommandType::NextQuestion,
            Self::EndQuiz => CommandType::EndQuiz,
            Self::StartTiebreaker => CommandType::StartTiebreaker,
        }
    }

    /// Wire body for the command destination.
    pub fn to_message(&self) -> CommandMessage {
        let mut message = CommandMessage::new(self.kind());
        if let Self::StartRound { round } = self {
            let mut payload = serde_json::Map::new();
            payload.insert("round".into(), serde_json::Value::String(round.clone()));
            message.payload = Some(payload);
        }
        message
    }
}

impl From<CommandType> for HostCommand {
    /// `StartRound` maps to the [`DEFAULT_ROUND`].
    fn from(kind: CommandType) -> Self {
        match kind {
            CommandType::Pause => Self::Pause,
            CommandType::Resume => Self::Resume,
            CommandType::StartRound => Self::start_round(DEFAULT_ROUND),
            CommandType::ViewLeaderboard => Self::ViewLeaderboard,
            CommandType::NextQuestion => Self::NextQuestion,
            CommandType::EndQuiz => Self::EndQuiz,
            CommandType::StartTiebreaker => Self::StartTiebreaker,
        }
    }
}

/// Commands a host may trigger in `phase`.
///
/// During the scoreboard the host either advances or, after the last
/// question, ends the quiz.
pub fn available_commands(
    phase: GamePhase,
    question_number: u32,
    total_questions: u32,
) -> &'static [CommandType] {
    match phase {
        GamePhase::Lobby => &[CommandType::StartRound],
        GamePhase::Question => &[CommandType::Pause],
        GamePhase::Buffer => &[],
        GamePhase::AnswerReveal => &[CommandType::ViewLeaderboard],
        GamePhase::Scoreboard if question_number < total_questions => &[CommandType::NextQuestion],
        GamePhase::Scoreboard => &[CommandType::EndQuiz],
        GamePhase::FinalResults => &[],
    }
}

/// A participant's answer before it is stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub team_id: TeamId,
    pub question_id: QuestionId,
    pub selected_option: String,
}

impl AnswerSubmission {
    /// Build the wire body, stamping it with `sent_at`.
    pub fn into_message(self, sent_at: DateTime<Utc>) -> AnswerSubmissionMessage {
        AnswerSubmissionMessage {
            kind: SubmissionKind::SubmitAnswer,
            team_id: self.team_id,
            question_id: self.question_id,
            selected_option: self.selected_option,
            timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
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
    use chrono::TimeZone;

    #[test]
    fn phase_command_mapping() {
        assert_eq!(
            available_commands(GamePhase::Lobby, 0, 3),
            [CommandType::StartRound]
        );
        assert_eq!(
            available_commands(GamePhase::Question, 1, 3),
            [CommandType::Pause]
        );
        assert!(available_commands(GamePhase::Buffer, 1, 3).is_empty());
        assert_eq!(
            available_commands(GamePhase::AnswerReveal, 1, 3),
            [CommandType::ViewLeaderboard]
        );
        assert_eq!(
            available_commands(GamePhase::Scoreboard, 2, 3),
            [CommandType::NextQuestion]
        );
        assert_eq!(
            available_commands(GamePhase::Scoreboard, 3, 3),
            [CommandType::EndQuiz]
        );
        assert!(available_commands(GamePhase::FinalResults, 3, 3).is_empty());
    }

    #[test]
    fn start_round_carries_round_payload() {
        let msg = HostCommand::start_round("HARD").to_message();
        assert_eq!(msg.kind, CommandType::StartRound);
        assert_eq!(
            msg.payload.unwrap().get("round"),
            Some(&serde_json::Value::String("HARD".into()))
        );
        assert!(HostCommand::EndQuiz.to_message().payload.is_none());
    }

    #[test]
    fn command_type_conversion_uses_default_round() {
        assert_eq!(
            HostCommand::from(CommandType::StartRound),
            HostCommand::start_round(DEFAULT_ROUND)
        );
        assert_eq!(HostCommand::from(CommandType::Resume), HostCommand::Resume);
    }

    #[test]
    fn submission_is_stamped_with_send_time() {
        let sent_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap();
        let msg = AnswerSubmission {
            team_id: 1,
            question_id: 2,
            selected_option: "B".into(),
        }
        .into_message(sent_at);
        assert_eq!(msg.timestamp, "2026-03-01T12:00:05.000Z");
        assert_eq!(msg.kind, SubmissionKind::SubmitAnswer);
    }
}
