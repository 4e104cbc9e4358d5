#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the quiz client.
//!
//! Feeds JSON fixtures shaped like real broker output through the decoder and
//! the view reducer, and checks the outbound bodies the client publishes.

use quiz_live_client::decoder::{self, Channel, DecodeError};
use quiz_live_client::protocol::{GameStateMessage, RankingEntry};
use quiz_live_client::stomp::{self, Frame, StompCommand};
use quiz_live_client::{
    available_commands, process_rankings, AnswerSubmission, ClientEvent, CommandType, GameEvent,
    GamePhase, GameView, HostCommand, Rejection, StateUpdate,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn state(body: serde_json::Value) -> StateUpdate {
    decoder::decode_state(&body.to_string()).expect("decode state")
}

fn feed(view: &mut GameView, channel: Channel, body: serde_json::Value) {
    let event = decoder::decode(channel, &body.to_string()).expect("decode");
    view.apply(ClientEvent::Game(event));
}

const QUESTION_FIXTURE: &str = r#"{
    "state": "QUESTION",
    "quizId": 12,
    "currentQuestionIndex": 2,
    "totalQuestions": 10,
    "currentRound": "MEDIUM",
    "timeRemaining": 25,
    "currentQuestion": {
        "id": 301,
        "text": "Which planet is known as the red planet?",
        "options": ["Venus", "Mars", "Jupiter", "Mercury"],
        "timeLimit": 30,
        "points": 20
    }
}"#;

// ════════════════════════════════════════════════════════════════════
// State broadcasts
// ════════════════════════════════════════════════════════════════════

#[test]
fn question_fixture_decodes_fully() {
    let update = decoder::decode_state(QUESTION_FIXTURE).unwrap();
    assert_eq!(update.phase, GamePhase::Question);
    assert_eq!(update.question_number, Some(3));
    assert_eq!(update.total_questions, 10);
    assert_eq!(update.time_remaining, 25);
    assert_eq!(update.current_round.as_deref(), Some("MEDIUM"));
    let question = update.current_question.unwrap();
    assert_eq!(question.id, 301);
    assert_eq!(question.options.len(), 4);
    assert!(question.correct_answer.is_none());
}

#[test]
fn sparse_lobby_body_gets_defaults() {
    let update = state(json!({"state": "LOBBY"}));
    assert_eq!(update, StateUpdate::new(GamePhase::Lobby));
}

#[test]
fn legacy_phase_names_are_normalized() {
    for (wire, phase) in [
        ("GRADING", GamePhase::Buffer),
        ("TIEBREAKER", GamePhase::Question),
        ("ENDED", GamePhase::FinalResults),
        ("answer_reveal", GamePhase::AnswerReveal),
        (" Scoreboard ", GamePhase::Scoreboard),
    ] {
        assert_eq!(state(json!({"state": wire})).phase, phase, "{wire}");
    }
}

#[test]
fn unknown_phase_is_a_decode_error() {
    let err = decoder::decode(Channel::State, r#"{"state":"WARMUP"}"#).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownPhase(_)));
    assert!(err.to_string().contains("WARMUP"));
}

#[test]
fn question_number_falls_back_to_one_based_field() {
    let update = state(json!({"state": "BUFFER", "questionNumber": 4}));
    assert_eq!(update.question_number, Some(4));

    // The zero-based index wins when both are present.
    let update = state(json!({
        "state": "BUFFER",
        "questionNumber": 9,
        "currentQuestionIndex": 0
    }));
    assert_eq!(update.question_number, Some(1));
}

#[test]
fn negative_time_remaining_is_clamped() {
    let update = state(json!({"state": "QUESTION", "timeRemaining": -4}));
    assert_eq!(update.time_remaining, 0);
}

#[test]
fn correct_answer_before_reveal_is_dropped() {
    let update = state(json!({
        "state": "QUESTION",
        "currentQuestion": {
            "id": 1, "text": "?", "options": ["A", "B"],
            "timeLimit": 10, "points": 5, "correctAnswer": "A"
        }
    }));
    assert!(update.current_question.unwrap().correct_answer.is_none());

    let update = state(json!({
        "state": "ANSWER_REVEAL",
        "currentQuestion": {
            "id": 1, "text": "?", "options": ["A", "B"],
            "timeLimit": 10, "points": 5, "correctAnswer": "A"
        }
    }));
    assert_eq!(
        update.current_question.unwrap().correct_answer.as_deref(),
        Some("A")
    );
}

#[test]
fn questions_outside_option_bounds_are_rejected() {
    for options in [json!(["only"]), json!(["1", "2", "3", "4", "5", "6", "7"])] {
        let body = json!({
            "state": "QUESTION",
            "currentQuestion": {
                "id": 5, "text": "?", "options": options,
                "timeLimit": 10, "points": 5
            }
        });
        let err = decoder::decode(Channel::State, &body.to_string()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidQuestion(_)), "{err}");
    }
}

#[test]
fn state_update_serializes_back_to_wire_names() {
    let update = decoder::decode_state(QUESTION_FIXTURE).unwrap();
    let wire = serde_json::to_value(&update).unwrap();
    assert_eq!(wire["state"], "QUESTION");
    assert_eq!(wire["questionNumber"], 3);
    assert_eq!(wire["currentQuestion"]["timeLimit"], 30);

    let parsed: GameStateMessage = serde_json::from_value(wire).unwrap();
    assert_eq!(parsed.state, "QUESTION");
    assert_eq!(parsed.question_number, Some(3));
}

// ════════════════════════════════════════════════════════════════════
// Other channels
// ════════════════════════════════════════════════════════════════════

#[test]
fn timer_fixture_decodes() {
    let event = decoder::decode(Channel::Timer, r#"{"timeRemaining":12,"totalTime":30}"#).unwrap();
    match event {
        GameEvent::TimerUpdate(tick) => {
            assert_eq!(tick.time_remaining, 12);
            assert_eq!(tick.total_time, Some(30));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn team_presence_fixtures_decode() {
    let connected = decoder::decode(
        Channel::Teams,
        r#"{"type":"TEAM_CONNECTED","teamId":8,"teamName":"Quizzly Bears"}"#,
    )
    .unwrap();
    assert!(matches!(
        connected,
        GameEvent::TeamConnected(ref t) if t.id == 8 && t.name == "Quizzly Bears"
    ));

    let gone = decoder::decode(Channel::Teams, r#"{"type":"TEAM_DISCONNECTED","teamId":8}"#)
        .unwrap();
    assert_eq!(gone, GameEvent::TeamDisconnected { team_id: 8 });

    let unknown = decoder::decode(Channel::Teams, r#"{"type":"TEAM_RENAMED","teamId":8}"#);
    assert!(matches!(unknown, Err(DecodeError::Json(_))));
}

#[test]
fn error_queue_text_is_kept_verbatim() {
    let event = decoder::decode(Channel::Errors, "  Quiz is paused  ").unwrap();
    assert_eq!(event, GameEvent::ErrorNotice("  Quiz is paused  ".into()));
}

// ════════════════════════════════════════════════════════════════════
// Rankings
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_rank_field_is_ignored() {
    let entries: Vec<RankingEntry> = serde_json::from_value(json!([
        {"rank": 1, "teamId": 1, "teamName": "Low", "score": 10},
        {"rank": 3, "teamId": 2, "teamName": "High", "score": 90},
        {"teamId": 3, "teamName": "Mid", "score": 50}
    ]))
    .unwrap();

    let ranked = process_rankings(&entries);
    let order: Vec<_> = ranked.iter().map(|r| (r.team_id, r.display_rank)).collect();
    assert_eq!(order, [(2, 1), (3, 2), (1, 3)]);
}

#[test]
fn tied_scores_share_competition_rank() {
    let entries: Vec<RankingEntry> = serde_json::from_value(json!([
        {"teamId": 1, "teamName": "A", "score": 100},
        {"teamId": 2, "teamName": "B", "score": 100},
        {"teamId": 3, "teamName": "C", "score": 100},
        {"teamId": 4, "teamName": "D", "score": 40}
    ]))
    .unwrap();

    let ranked = process_rankings(&entries);
    let ranks: Vec<_> = ranked.iter().map(|r| r.display_rank).collect();
    assert_eq!(ranks, [1, 1, 1, 4]);
    assert!(ranked.iter().take(3).all(|r| r.is_top_three()));
    assert!(!ranked[3].is_top_three());
}

// ════════════════════════════════════════════════════════════════════
// Fixtures through the view
// ════════════════════════════════════════════════════════════════════

#[test]
fn question_cycle_through_view() {
    let mut view = GameView::new();
    let question = json!({
        "id": 77, "text": "2 + 2?", "options": ["3", "4", "5"],
        "timeLimit": 15, "points": 10
    });

    feed(
        &mut view,
        Channel::State,
        json!({"state": "QUESTION", "currentQuestionIndex": 0, "totalQuestions": 1, "currentQuestion": question}),
    );
    assert_eq!(view.timer().total_time, 15);
    assert_eq!(view.timer().time_remaining, 15);
    view.select_option("4").unwrap();
    let submission = view.submit(3).unwrap();
    assert_eq!(
        submission,
        AnswerSubmission {
            team_id: 3,
            question_id: 77,
            selected_option: "4".into()
        }
    );
    assert_eq!(view.select_option("5"), Err(Rejection::AlreadySubmitted));

    let mut revealed = question.clone();
    revealed["correctAnswer"] = json!("4");
    feed(
        &mut view,
        Channel::State,
        json!({"state": "ANSWER_REVEAL", "currentQuestionIndex": 0, "totalQuestions": 1, "currentQuestion": revealed}),
    );
    assert_eq!(view.is_answer_correct(), Some(true));

    feed(
        &mut view,
        Channel::State,
        json!({
            "state": "SCOREBOARD", "currentQuestionIndex": 0, "totalQuestions": 1,
            "rankings": [{"teamId": 3, "teamName": "Us", "score": 10}, {"teamId": 4, "teamName": "Them", "score": 0}]
        }),
    );
    assert_eq!(view.my_ranking(3).unwrap().display_rank, 1);
    assert_eq!(view.available_commands(), &[CommandType::EndQuiz]);
}

#[test]
fn sparse_reveal_and_scoreboard_keep_the_question_number() {
    let mut view = GameView::new();
    let question = json!({
        "id": 1, "text": "Pick one", "options": ["A", "B", "C", "D"],
        "timeLimit": 30, "points": 10
    });
    feed(
        &mut view,
        Channel::State,
        json!({"state": "QUESTION", "questionNumber": 1, "totalQuestions": 2, "currentQuestion": question}),
    );
    view.select_option("B").unwrap();
    view.submit(2).unwrap();

    let mut revealed = question.clone();
    revealed["correctAnswer"] = json!("A");
    feed(
        &mut view,
        Channel::State,
        json!({"state": "ANSWER_REVEAL", "currentQuestion": revealed}),
    );
    assert_eq!(view.is_answer_correct(), Some(false));
    assert!(view.has_submitted());

    feed(&mut view, Channel::State, json!({"state": "SCOREBOARD", "rankings": []}));
    assert_eq!(view.question_number(), 1);
    assert_eq!(view.is_answer_correct(), Some(false));

    feed(&mut view, Channel::State, json!({"state": "QUESTION", "questionNumber": 2}));
    assert_eq!(view.selected_option(), None);
    assert!(!view.has_submitted());
    assert_eq!(view.is_answer_correct(), None);
}

#[test]
fn timer_fixture_drives_urgency() {
    let mut view = GameView::new();
    feed(&mut view, Channel::State, json!({"state": "QUESTION", "timeRemaining": 30}));
    feed(&mut view, Channel::Timer, json!({"timeRemaining": 0, "totalTime": 30}));
    assert!(view.timer().is_expired());
    assert_eq!(view.select_option("A"), Err(Rejection::TimeExpired));
}

// ════════════════════════════════════════════════════════════════════
// Outbound bodies
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_command_type_has_a_wire_name() {
    for (kind, wire) in [
        (CommandType::Pause, "PAUSE"),
        (CommandType::Resume, "RESUME"),
        (CommandType::StartRound, "START_ROUND"),
        (CommandType::ViewLeaderboard, "VIEW_LEADERBOARD"),
        (CommandType::NextQuestion, "NEXT_QUESTION"),
        (CommandType::EndQuiz, "END_QUIZ"),
        (CommandType::StartTiebreaker, "START_TIEBREAKER"),
    ] {
        let body = serde_json::to_value(HostCommand::from(kind).to_message()).unwrap();
        assert_eq!(body["type"], wire);
    }
}

#[test]
fn host_commands_follow_phase() {
    assert_eq!(available_commands(GamePhase::Lobby, 0, 5), &[CommandType::StartRound]);
    assert_eq!(available_commands(GamePhase::Question, 1, 5), &[CommandType::Pause]);
    assert!(available_commands(GamePhase::Buffer, 1, 5).is_empty());
    assert_eq!(
        available_commands(GamePhase::AnswerReveal, 1, 5),
        &[CommandType::ViewLeaderboard]
    );
    assert_eq!(
        available_commands(GamePhase::Scoreboard, 1, 5),
        &[CommandType::NextQuestion]
    );
    assert_eq!(available_commands(GamePhase::Scoreboard, 5, 5), &[CommandType::EndQuiz]);
    assert!(available_commands(GamePhase::FinalResults, 5, 5).is_empty());
}

#[test]
fn send_frame_wraps_json_body() {
    let body = serde_json::to_string(&HostCommand::start_round("HARD").to_message()).unwrap();
    let frame = Frame::new(StompCommand::Send)
        .with_header("destination", "/app/quiz/3/command")
        .with_header("content-type", "application/json")
        .with_body(body.clone());

    let parsed = stomp::parse_message(&frame.encode()).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].command, StompCommand::Send);
    assert_eq!(parsed[0].body, body);
}
