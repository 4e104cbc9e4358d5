#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the quiz client connection lifecycle.
//!
//! Covers the STOMP handshake, subscriptions per role, outbound command and
//! submission frames, inbound routing, teardown, heartbeats, and the
//! reconnect policy. Reconnect tests run on paused time.

mod common;

use std::time::Duration;

use common::*;
use quiz_live_client::stomp::{Frame, StompCommand};
use quiz_live_client::{
    AnswerSubmission, ClientEvent, ConnectParams, GameEvent, GamePhase, HostCommand, QuizClient,
    QuizClientConfig, QuizClientError, Role,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

// ── Helpers ─────────────────────────────────────────────────────────

async fn next(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(120), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

async fn next_game(events: &mut mpsc::Receiver<ClientEvent>) -> GameEvent {
    match next(events).await {
        ClientEvent::Game(event) => event,
        other => panic!("expected a game event, got {other:?}"),
    }
}

async fn connected(
    role: Role,
    config: QuizClientConfig,
) -> (
    QuizClient<MockConnector>,
    mpsc::Receiver<ClientEvent>,
    MockHarness,
    MockLink,
) {
    init_tracing();
    let (connector, mut harness) = MockConnector::accepting();
    let (mut client, mut events) = QuizClient::new(connector, config);
    client.connect(ConnectParams::new(42, role).with_access_code("CODE-42"));

    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 0 });
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let link = harness.next_link().await;
    (client, events, harness, link)
}

fn destinations(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .map(|f| f.header("destination").unwrap().to_string())
        .collect()
}

fn body_json(frame: &Frame) -> Value {
    serde_json::from_str(&frame.body).unwrap()
}

// ── Handshake and subscriptions ─────────────────────────────────────

#[tokio::test]
async fn connect_frame_carries_access_code_and_heartbeat() {
    let (mut client, _events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    let connect = &link.sent_with(StompCommand::Connect)[0];
    assert_eq!(connect.header("accessCode"), Some("CODE-42"));
    assert_eq!(connect.header("accept-version"), Some("1.2"));
    assert_eq!(connect.header("heart-beat"), Some("10000,10000"));
    assert_eq!(connect.header("host"), Some("localhost:8090"));
    assert!(client.is_connected());
    assert!(!client.is_connecting());

    client.disconnect().await;
}

#[tokio::test]
async fn participant_subscribes_to_quiz_channels() {
    let (mut client, _events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    let subs = link.sent_with(StompCommand::Subscribe);
    assert_eq!(
        destinations(&subs),
        [
            "/topic/quiz/42/state",
            "/topic/quiz/42/timer",
            "/topic/quiz/42/teams",
            "/user/queue/errors",
        ]
    );
    let ids: Vec<_> = subs.iter().map(|f| f.header("id").unwrap()).collect();
    assert_eq!(ids, [STATE, TIMER, TEAMS, ERRORS]);

    client.disconnect().await;
}

#[tokio::test]
async fn host_also_subscribes_to_submissions() {
    let (mut client, _events, _harness, link) =
        connected(Role::Host, QuizClientConfig::default()).await;

    let subs = link.sent_with(StompCommand::Subscribe);
    assert_eq!(subs.len(), 5);
    assert_eq!(subs[4].header("destination"), Some("/topic/quiz/42/host"));
    assert_eq!(subs[4].header("id"), Some(HOST));

    client.disconnect().await;
}

#[tokio::test]
async fn connect_while_running_is_a_no_op() {
    let (mut client, _events, harness, _link) =
        connected(Role::Host, QuizClientConfig::default()).await;

    client.connect(ConnectParams::new(99, Role::Participant));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.attempts(), 1);
    assert_eq!(client.params().unwrap().quiz_id, 42);

    client.disconnect().await;
}

// ── Outbound ────────────────────────────────────────────────────────

#[tokio::test]
async fn host_command_is_published_to_command_destination() {
    let (mut client, _events, _harness, link) =
        connected(Role::Host, QuizClientConfig::default()).await;

    assert_ok!(client.send_command(HostCommand::start_round("HARD")));
    assert_ok!(client.send_command(HostCommand::NextQuestion));

    let sends = link.wait_for(StompCommand::Send, 2).await;
    assert_eq!(
        destinations(&sends),
        ["/app/quiz/42/command", "/app/quiz/42/command"]
    );
    assert_eq!(sends[0].header("content-type"), Some("application/json"));
    assert_eq!(
        body_json(&sends[0]),
        serde_json::json!({"type": "START_ROUND", "payload": {"round": "HARD"}})
    );
    assert_eq!(
        body_json(&sends[1]),
        serde_json::json!({"type": "NEXT_QUESTION"})
    );

    client.disconnect().await;
}

#[tokio::test]
async fn answer_is_published_with_send_time_stamp() {
    let (mut client, _events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    let before = chrono::Utc::now();
    assert_ok!(client.submit_answer(AnswerSubmission {
        team_id: 7,
        question_id: 3,
        selected_option: "B".into(),
    }));

    let send = &link.wait_for(StompCommand::Send, 1).await[0];
    assert_eq!(send.header("destination"), Some("/app/quiz/42/submit"));
    let body = body_json(send);
    assert_eq!(body["type"], "SUBMIT_ANSWER");
    assert_eq!(body["teamId"], 7);
    assert_eq!(body["questionId"], 3);
    assert_eq!(body["selectedOption"], "B");
    let stamped = chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap())
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert!(stamped.timestamp_millis() >= before.timestamp_millis());

    client.disconnect().await;
}

#[tokio::test]
async fn publishing_without_connection_is_rejected() {
    let (connector, _harness) = MockConnector::new(vec![]);
    let (client, _events) = QuizClient::new(connector, QuizClientConfig::default());

    let err = assert_err!(client.send_command(HostCommand::Pause));
    assert!(matches!(err, QuizClientError::NotConnected));
    let err = assert_err!(client.submit_answer(AnswerSubmission {
        team_id: 1,
        question_id: 1,
        selected_option: "A".into(),
    }));
    assert!(matches!(err, QuizClientError::NotConnected));
}

// ── Inbound routing ─────────────────────────────────────────────────

#[tokio::test]
async fn messages_are_routed_by_subscription() {
    let (mut client, mut events, _harness, link) =
        connected(Role::Host, QuizClientConfig::default()).await;

    link.message(TIMER, timer_json(-3));
    link.message(TEAMS, team_json("TEAM_CONNECTED", 5));
    link.message(HOST, submission_json(5));
    link.message(ERRORS, "Answer rejected: time expired");
    link.message(STATE, state_json("GRADING", 1, None));

    assert!(matches!(
        next_game(&mut events).await,
        GameEvent::TimerUpdate(t) if t.time_remaining == 0
    ));
    assert!(matches!(
        next_game(&mut events).await,
        GameEvent::TeamConnected(t) if t.id == 5 && t.name == "Team 5"
    ));
    assert!(matches!(
        next_game(&mut events).await,
        GameEvent::SubmissionReceived(s) if s.team_id == 5
    ));
    assert_eq!(
        next_game(&mut events).await,
        GameEvent::ErrorNotice("Answer rejected: time expired".into())
    );
    match next_game(&mut events).await {
        GameEvent::StateUpdate(update) => {
            assert_eq!(update.phase, GamePhase::Buffer);
            assert_eq!(update.question_number, Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn undecodable_input_is_dropped_without_disconnecting() {
    let (mut client, mut events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    link.message(STATE, "{not json");
    link.message(STATE, state_json("WARMUP", 0, None));
    link.push("GARBAGE\n\n\0");
    link.message("sub-99", state_json("LOBBY", 0, None));
    link.push("\n");
    link.message(STATE, state_json("QUESTION", 1, Some(question_json(1, None))));

    match next_game(&mut events).await {
        GameEvent::StateUpdate(update) => {
            assert_eq!(update.phase, GamePhase::Question);
            assert_eq!(update.time_remaining, 20);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn several_frames_in_one_message_are_all_delivered() {
    let (mut client, mut events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    let batch = format!(
        "{}\n{}",
        message_frame(TIMER, timer_json(9)),
        message_frame(TIMER, timer_json(8))
    );
    link.push(batch);

    assert!(matches!(next_game(&mut events).await, GameEvent::TimerUpdate(t) if t.time_remaining == 9));
    assert!(matches!(next_game(&mut events).await, GameEvent::TimerUpdate(t) if t.time_remaining == 8));

    client.disconnect().await;
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_unsubscribes_and_closes() {
    let (mut client, mut events, _harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    client.disconnect().await;

    let unsubscribed: Vec<_> = link
        .sent_with(StompCommand::Unsubscribe)
        .iter()
        .map(|f| f.header("id").unwrap().to_string())
        .collect();
    assert_eq!(unsubscribed, [STATE, TIMER, TEAMS, ERRORS]);
    assert_eq!(link.sent_with(StompCommand::Disconnect).len(), 1);
    assert!(link.is_closed());

    assert_eq!(
        next(&mut events).await,
        ClientEvent::Disconnected {
            reason: Some("client disconnected".into())
        }
    );
    assert!(!client.is_connected());
    assert!(!client.is_connecting());
    assert_eq!(client.reconnect_attempts(), 0);
    assert!(matches!(
        client.send_command(HostCommand::Pause),
        Err(QuizClientError::NotConnected)
    ));
}

// ── Heartbeats ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn outgoing_heartbeats_follow_negotiated_interval() {
    init_tracing();
    let (connector, mut harness) = MockConnector::new(vec![Attempt::AcceptHeartbeat("0,1000")]);
    let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
    client.connect(ConnectParams::new(1, Role::Participant));
    let _ = next(&mut events).await;
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let link = harness.next_link().await;

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(link.heartbeats_sent(), 2);
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn silent_broker_trips_heartbeat_watchdog() {
    init_tracing();
    let (connector, mut harness) = MockConnector::new(vec![Attempt::AcceptHeartbeat("1000,0")]);
    let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
    client.connect(ConnectParams::new(1, Role::Participant));
    let _ = next(&mut events).await;
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let start = Instant::now();
    let link = harness.next_link().await;

    tokio::time::sleep(Duration::from_secs(15)).await;
    link.push("\n");

    match next(&mut events).await {
        ClientEvent::ConnectionError {
            message,
            attempts,
            terminal,
        } => {
            assert!(message.contains("heartbeat"), "{message}");
            assert_eq!(attempts, 1);
            assert!(!terminal);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(start.elapsed() >= Duration::from_secs(35));
    assert!(link.is_closed());

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_does_not_trip_heartbeat_watchdog() {
    init_tracing();
    let (connector, mut harness) = MockConnector::new(vec![Attempt::AcceptHeartbeat("1000,0")]);
    let config = QuizClientConfig::default().with_event_channel_capacity(1);
    let (mut client, mut events) = QuizClient::new(connector, config);
    client.connect(ConnectParams::new(1, Role::Host));
    let _ = next(&mut events).await;
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let link = harness.next_link().await;

    for team in 1..=3 {
        link.message(TEAMS, team_json("TEAM_CONNECTED", team));
    }
    // Leave the supervisor blocked on the full channel well past the
    // 20s watchdog window.
    tokio::time::sleep(Duration::from_secs(30)).await;

    for team in 1..=3 {
        assert!(matches!(
            next_game(&mut events).await,
            GameEvent::TeamConnected(presence) if presence.id == team
        ));
    }
    assert!(
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .is_err(),
        "no event expected right after draining"
    );
    assert!(client.is_connected());
    assert!(!link.is_closed());

    client.disconnect().await;
}

// ── Reconnect policy ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn broker_error_frame_triggers_reconnect() {
    let (mut client, mut events, mut harness, link) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    link.push(
        Frame::new(StompCommand::Error)
            .with_header("message", "session expired")
            .encode(),
    );

    match next(&mut events).await {
        ClientEvent::ConnectionError {
            message,
            attempts,
            terminal,
        } => {
            assert!(message.contains("session expired"));
            assert_eq!(attempts, 1);
            assert!(!terminal);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.reconnect_attempts(), 1);

    let start = Instant::now();
    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 1 });
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    assert_eq!(client.reconnect_attempts(), 0);
    let _second = harness.next_link().await;

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn broker_closing_connection_triggers_reconnect() {
    let (mut client, mut events, mut harness, link) =
        connected(Role::Host, QuizClientConfig::default()).await;

    link.close();
    assert!(matches!(
        next(&mut events).await,
        ClientEvent::ConnectionError { attempts: 1, terminal: false, .. }
    ));
    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 1 });
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let second = harness.next_link().await;
    assert_eq!(second.sent_with(StompCommand::Subscribe).len(), 5);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    init_tracing();
    let (connector, harness) = MockConnector::new(vec![]);
    let (mut client, mut events) = QuizClient::new(connector, QuizClientConfig::default());
    let start = Instant::now();
    client.connect(ConnectParams::new(1, Role::Participant));

    for attempt in 0..10u32 {
        assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt });
        match next(&mut events).await {
            ClientEvent::ConnectionError {
                attempts, terminal, ..
            } => {
                assert_eq!(attempts, attempt + 1);
                assert_eq!(terminal, attempt == 9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(matches!(
        next(&mut events).await,
        ClientEvent::Disconnected { reason: Some(_) }
    ));

    assert_eq!(harness.attempts(), 10);
    assert!(start.elapsed() >= Duration::from_secs(45));
    assert!(!client.is_connected());
    assert!(!client.is_connecting());

    // No further automatic attempts.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.attempts(), 10);
    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_delay_is_clamped_by_max_delay() {
    let (connector, _harness) = MockConnector::new(vec![Attempt::Refuse, Attempt::Accept]);
    let config = QuizClientConfig::default()
        .with_max_reconnect_delay(Duration::from_secs(2))
        .with_reconnect_delay(Duration::from_secs(60));
    let (mut client, mut events) = QuizClient::new(connector, config);
    client.connect(ConnectParams::new(1, Role::Participant));

    let _ = next(&mut events).await;
    let _ = next(&mut events).await;
    let start = Instant::now();
    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 1 });
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(next(&mut events).await, ClientEvent::Connected);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_recovers_from_terminal_failure() {
    let (connector, mut harness) = MockConnector::new(vec![Attempt::Refuse, Attempt::Accept]);
    let config = QuizClientConfig::default().with_max_reconnect_attempts(1);
    let (mut client, mut events) = QuizClient::new(connector, config);
    client.connect(ConnectParams::new(1, Role::Participant));

    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 0 });
    assert!(matches!(
        next(&mut events).await,
        ClientEvent::ConnectionError { attempts: 1, terminal: true, .. }
    ));
    assert!(matches!(
        next(&mut events).await,
        ClientEvent::Disconnected { .. }
    ));

    let start = Instant::now();
    assert_ok!(client.reconnect().await);
    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 0 });
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let _link = harness.next_link().await;

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_replaces_live_connection_quietly() {
    let (mut client, mut events, mut harness, first) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    assert_ok!(client.reconnect().await);
    assert!(first.is_closed());
    assert_eq!(first.sent_with(StompCommand::Unsubscribe).len(), 4);

    // No Disconnected in between.
    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 0 });
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    let _second = harness.next_link().await;

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_manual_reconnects_keep_one_pending_attempt() {
    let (mut client, mut events, harness, _first) =
        connected(Role::Participant, QuizClientConfig::default()).await;

    assert_ok!(client.reconnect().await);
    assert_ok!(client.reconnect().await);
    assert_ok!(client.reconnect().await);

    assert_eq!(next(&mut events).await, ClientEvent::Connecting { attempt: 0 });
    assert_eq!(next(&mut events).await, ClientEvent::Connected);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(harness.attempts(), 2);

    client.disconnect().await;
}
