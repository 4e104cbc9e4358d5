//! Turns raw message bodies into typed [`GameEvent`]s.
//!
//! Every function here is pure. A body that fails to decode yields a
//! [`DecodeError`]; the connection task logs it and drops the frame, so one
//! bad message never affects the ones that follow.

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::event::{GameEvent, StateUpdate, SubmissionRecord, TeamPresence, TimerUpdate};
use crate::phase::{GamePhase, UnknownPhase};
use crate::protocol::{
    GameStateMessage, QuestionData, SubmissionNotification, TeamConnectionKind,
    TeamConnectionMessage, TimerMessage,
};

/// Fewest answer options a question may carry.
pub const MIN_OPTIONS: usize = 2;
/// Most answer options a question may carry.
pub const MAX_OPTIONS: usize = 6;

/// Broadcast channels a client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    State,
    Timer,
    Teams,
    /// Host-only submission notifications.
    Host,
    /// Private error queue.
    Errors,
}

/// Why a body could not be turned into an event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

/// Decode one message body received on `channel`.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the body is not valid JSON for the channel,
/// names an unknown phase, or carries an invalid question.
pub fn decode(channel: Channel, body: &str) -> Result<GameEvent, DecodeError> {
    match channel {
        Channel::State => Ok(GameEvent::StateUpdate(Box::new(decode_state(body)?))),
        Channel::Timer => {
            let msg: TimerMessage = serde_json::from_str(body)?;
            Ok(GameEvent::TimerUpdate(TimerUpdate {
                time_remaining: clamp_seconds(msg.time_remaining),
                total_time: msg.total_time.map(clamp_seconds),
            }))
        }
        Channel::Teams => {
            let msg: TeamConnectionMessage = serde_json::from_str(body)?;
            Ok(match msg.kind {
                TeamConnectionKind::TeamConnected => GameEvent::TeamConnected(TeamPresence {
                    id: msg.team_id,
                    name: msg.team_name,
                    connected_at: Utc::now(),
                }),
                TeamConnectionKind::TeamDisconnected => GameEvent::TeamDisconnected {
                    team_id: msg.team_id,
                },
            })
        }
        Channel::Host => {
            let msg: SubmissionNotification = serde_json::from_str(body)?;
            Ok(GameEvent::SubmissionReceived(SubmissionRecord {
                team_id: msg.team_id,
                team_name: msg.team_name,
                timestamp: msg.timestamp,
            }))
        }
        Channel::Errors => Ok(GameEvent::ErrorNotice(body.to_string())),
    }
}

/// Decode a state-topic body into a fully-populated [`StateUpdate`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_state(body: &str) -> Result<StateUpdate, DecodeError> {
    let msg: GameStateMessage = serde_json::from_str(body)?;
    normalize_state(msg)
}

/// Apply field defaults and phase normalization to a parsed state body.
///
/// - legacy phase aliases become canonical phases
/// - the question number comes from the zero-based index when present,
///   otherwise from `questionNumber`, otherwise stays unset
/// - a missing timer in the question phase starts at the question's time limit
/// - a correct answer broadcast before the reveal is discarded
///
/// # Errors
///
/// See [`decode`].
pub fn normalize_state(msg: GameStateMessage) -> Result<StateUpdate, DecodeError> {
    let phase: GamePhase = msg.state.parse()?;

    let question_number = msg
        .current_question_index
        .map(|index| index.saturating_add(1))
        .or(msg.question_number);

    let current_question = match msg.current_question {
        Some(question) => Some(sanitize_question(question, phase)?),
        None => None,
    };

    let time_remaining = match (msg.time_remaining, &current_question) {
        (Some(raw), _) => clamp_seconds(raw),
        (None, Some(question)) if phase == GamePhase::Question => question.time_limit,
        (None, _) => 0,
    };

    Ok(StateUpdate {
        phase,
        question_number,
        total_questions: msg.total_questions.unwrap_or(0),
        time_remaining,
        current_question,
        rankings: msg.rankings.unwrap_or_default(),
        current_round: msg.current_round,
        message: msg.message,
    })
}

fn sanitize_question(
    mut question: QuestionData,
    phase: GamePhase,
) -> Result<QuestionData, DecodeError> {
    let count = question.options.len();
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
        return Err(DecodeError::InvalidQuestion(format!(
            "question {} has {count} options",
            question.id
        )));
    }
    if question.options.iter().any(|o| o.trim().is_empty()) {
        return Err(DecodeError::InvalidQuestion(format!(
            "question {} has an empty option",
            question.id
        )));
    }
    if question.time_limit == 0 || question.points == 0 {
        return Err(DecodeError::InvalidQuestion(format!(
            "question {} has a zero time limit or point value",
            question.id
        )));
    }
    if question.correct_answer.is_some() && !phase.reveals_answer() {
        warn!(
            question_id = question.id,
            %phase,
            "correct answer broadcast before reveal; discarding it"
        );
        question.correct_answer = None;
    }
    Ok(question)
}

/// Negative timer values mean "expired".
fn clamp_seconds(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
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
    use crate::protocol::RankingEntry;

    fn question_json(correct: Option<&str>) -> serde_json::Value {
        let mut q = serde_json::json!({
            "id": 9,
            "text": "Capital of France?",
            "options": ["Paris", "Rome", "Berlin", "Madrid"],
            "timeLimit": 30,
            "points": 10
        });
        if let Some(answer) = correct {
            q["correctAnswer"] = answer.into();
        }
        q
    }

    #[test]
    fn index_takes_precedence_over_question_number() {
        let body = serde_json::json!({
            "state": "QUESTION",
            "currentQuestionIndex": 0,
            "questionNumber": 7,
            "totalQuestions": 2,
            "currentQuestion": question_json(None),
        });
        let update = decode_state(&body.to_string()).unwrap();
        assert_eq!(update.question_number, Some(1));
        assert_eq!(update.total_questions, 2);
    }

    #[test]
    fn question_number_used_when_index_absent() {
        let update = decode_state(r#"{"state":"SCOREBOARD","questionNumber":4}"#).unwrap();
        assert_eq!(update.question_number, Some(4));
        assert_eq!(update.phase, GamePhase::Scoreboard);
    }

    #[test]
    fn missing_fields_default_to_zero_values() {
        let update = decode_state(r#"{"state":"LOBBY"}"#).unwrap();
        assert_eq!(update, StateUpdate::new(GamePhase::Lobby));
    }

    #[test]
    fn aliases_are_normalized() {
        let update = decode_state(r#"{"state":"ROUND_SUMMARY"}"#).unwrap();
        assert_eq!(update.phase, GamePhase::Scoreboard);
        let update = decode_state(r#"{"state":"ACTIVE"}"#).unwrap();
        assert_eq!(update.phase, GamePhase::Question);
    }

    #[test]
    fn question_phase_timer_defaults_to_time_limit() {
        let body = serde_json::json!({ "state": "QUESTION", "currentQuestion": question_json(None) });
        let update = decode_state(&body.to_string()).unwrap();
        assert_eq!(update.time_remaining, 30);

        let body = serde_json::json!({
            "state": "QUESTION",
            "timeRemaining": 12,
            "currentQuestion": question_json(None),
        });
        assert_eq!(decode_state(&body.to_string()).unwrap().time_remaining, 12);
    }

    #[test]
    fn negative_timer_is_clamped() {
        let update = decode_state(r#"{"state":"BUFFER","timeRemaining":-3}"#).unwrap();
        assert_eq!(update.time_remaining, 0);
        let event = decode(Channel::Timer, r#"{"timeRemaining":-1,"totalTime":30}"#).unwrap();
        assert_eq!(
            event,
            GameEvent::TimerUpdate(TimerUpdate {
                time_remaining: 0,
                total_time: Some(30)
            })
        );
    }

    #[test]
    fn early_correct_answer_is_stripped() {
        let body = serde_json::json!({ "state": "QUESTION", "currentQuestion": question_json(Some("Paris")) });
        let update = decode_state(&body.to_string()).unwrap();
        assert!(update.current_question.unwrap().correct_answer.is_none());

        let body = serde_json::json!({ "state": "REVEAL", "currentQuestion": question_json(Some("Paris")) });
        let update = decode_state(&body.to_string()).unwrap();
        assert_eq!(
            update.current_question.unwrap().correct_answer.as_deref(),
            Some("Paris")
        );
    }

    #[test]
    fn invalid_questions_are_rejected() {
        let mut q = question_json(None);
        q["options"] = serde_json::json!(["only"]);
        let body = serde_json::json!({ "state": "QUESTION", "currentQuestion": q });
        assert!(matches!(
            decode_state(&body.to_string()),
            Err(DecodeError::InvalidQuestion(_))
        ));

        let mut q = question_json(None);
        q["options"] = serde_json::json!(["A", " "]);
        let body = serde_json::json!({ "state": "QUESTION", "currentQuestion": q });
        assert!(decode_state(&body.to_string()).is_err());

        let mut q = question_json(None);
        q["timeLimit"] = 0.into();
        let body = serde_json::json!({ "state": "QUESTION", "currentQuestion": q });
        assert!(decode_state(&body.to_string()).is_err());
    }

    #[test]
    fn malformed_and_unknown_bodies_fail() {
        assert!(matches!(
            decode(Channel::State, "not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(Channel::State, r#"{"state":"WAT"}"#),
            Err(DecodeError::UnknownPhase(_))
        ));
        assert!(decode(Channel::Teams, r#"{"type":"TEAM_EXPLODED","teamId":1}"#).is_err());
        assert!(decode(Channel::Timer, "{}").is_err());
    }

    #[test]
    fn team_events_decode() {
        let event = decode(
            Channel::Teams,
            r#"{"type":"TEAM_CONNECTED","teamId":5,"teamName":"Owls"}"#,
        )
        .unwrap();
        match event {
            GameEvent::TeamConnected(presence) => {
                assert_eq!(presence.id, 5);
                assert_eq!(presence.name, "Owls");
            }
            other => panic!("expected TeamConnected, got {other:?}"),
        }
        let event = decode(
            Channel::Teams,
            r#"{"type":"TEAM_DISCONNECTED","teamId":5,"teamName":"Owls"}"#,
        )
        .unwrap();
        assert_eq!(event, GameEvent::TeamDisconnected { team_id: 5 });
    }

    #[test]
    fn submission_and_error_channels() {
        let event = decode(
            Channel::Host,
            r#"{"type":"SUBMISSION_RECEIVED","teamId":2,"teamName":"Cats","timestamp":"t"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            GameEvent::SubmissionReceived(SubmissionRecord {
                team_id: 2,
                team_name: "Cats".into(),
                timestamp: "t".into()
            })
        );
        let event = decode(Channel::Errors, "Quiz is not active").unwrap();
        assert_eq!(event, GameEvent::ErrorNotice("Quiz is not active".into()));
    }

    #[test]
    fn state_update_survives_json_round_trip() {
        let update = StateUpdate {
            phase: GamePhase::Scoreboard,
            question_number: Some(3),
            total_questions: 5,
            time_remaining: 0,
            current_question: Some(QuestionData {
                id: 4,
                text: "Pick".into(),
                options: vec!["z".into(), "a".into(), "m".into()],
                time_limit: 20,
                points: 5,
                correct_answer: Some("a".into()),
            }),
            rankings: vec![RankingEntry {
                rank: None,
                team_id: 1,
                team_name: "Owls".into(),
                score: 15,
            }],
            current_round: Some("EASY".into()),
            message: Some("well done".into()),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(decode_state(&json).unwrap(), update);
    }
}
