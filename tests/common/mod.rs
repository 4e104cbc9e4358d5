#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for quiz client integration tests.
//!
//! [`MockConnector`] hands out channel-driven [`MockTransport`]s according to
//! a script of connection outcomes. Each accepted connection answers CONNECT
//! on its own and surfaces a [`MockLink`] through [`MockHarness`] so the test
//! can inject inbound frames and inspect what the client sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_live_client::stomp::{self, Frame, StompCommand};
use quiz_live_client::{Connector, QuizClientError, Transport};
use serde_json::{json, Value};
use tokio::sync::mpsc;

type Inbound = Option<Result<String, QuizClientError>>;

// ── Subscription ids ────────────────────────────────────────────────

pub const STATE: &str = "sub-0";
pub const TIMER: &str = "sub-1";
pub const TEAMS: &str = "sub-2";
pub const ERRORS: &str = "sub-3";
/// Host role only.
pub const HOST: &str = "sub-4";

// ── MockTransport ───────────────────────────────────────────────────

/// How the broker answers CONNECT.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// CONNECTED without heartbeats.
    Accept,
    /// CONNECTED with the given `heart-beat` header.
    AcceptHeartbeat(&'static str),
    /// ERROR with the given message header.
    Reject(&'static str),
    /// The connector itself fails.
    Refuse,
}

pub struct MockTransport {
    /// Frames queued by the transport itself (handshake replies).
    pending: VecDeque<Inbound>,
    /// Frames injected by the test.
    inbound: mpsc::UnboundedReceiver<Inbound>,
    reply: Attempt,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), QuizClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QuizClientError::TransportClosed);
        }
        if frame.starts_with("CONNECT\n") {
            let reply = match self.reply {
                Attempt::AcceptHeartbeat(hb) => Frame::new(StompCommand::Connected)
                    .with_header("version", "1.2")
                    .with_header("heart-beat", hb),
                Attempt::Reject(message) => {
                    Frame::new(StompCommand::Error).with_header("message", message)
                }
                Attempt::Accept | Attempt::Refuse => {
                    Frame::new(StompCommand::Connected).with_header("version", "1.2")
                }
            };
            self.pending.push_back(Some(Ok(reply.encode())));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
        if let Some(item) = self.pending.pop_front() {
            return item;
        }
        match self.inbound.recv().await {
            Some(item) => item,
            // Test dropped its link: stay open until the client tears down.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), QuizClientError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ── MockLink ────────────────────────────────────────────────────────

/// Test-side handle to one accepted connection.
#[derive(Clone)]
pub struct MockLink {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockLink {
    /// Inject a raw text message.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Some(Ok(text.into())));
    }

    /// Inject a MESSAGE frame for `subscription`.
    pub fn message(&self, subscription: &str, body: impl Into<String>) {
        self.push(message_frame(subscription, body));
    }

    /// The broker closes the connection cleanly.
    pub fn close(&self) {
        let _ = self.inbound.send(None);
    }

    /// The connection fails with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .inbound
            .send(Some(Err(QuizClientError::TransportReceive(reason.into()))));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Everything the client sent, parsed. Bare heartbeats are skipped.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|text| stomp::parse_message(text).unwrap())
            .collect()
    }

    pub fn sent_with(&self, command: StompCommand) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|f| f.command == command)
            .collect()
    }

    /// Number of bare heartbeat EOLs the client sent.
    pub fn heartbeats_sent(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|text| text.as_str() == stomp::HEARTBEAT)
            .count()
    }

    /// Poll until the client has sent `count` frames of `command`.
    pub async fn wait_for(&self, command: StompCommand, count: usize) -> Vec<Frame> {
        for _ in 0..500 {
            let frames = self.sent_with(command);
            if frames.len() >= count {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("client never sent {count} {command} frame(s)");
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Scripted connection outcomes; [`Attempt::Refuse`] once the script runs out.
pub struct MockConnector {
    script: StdMutex<VecDeque<Attempt>>,
    links: mpsc::UnboundedSender<MockLink>,
    attempts: Arc<AtomicU32>,
}

/// Test-side view of a [`MockConnector`].
pub struct MockHarness {
    links: mpsc::UnboundedReceiver<MockLink>,
    attempts: Arc<AtomicU32>,
}

impl MockConnector {
    pub fn new(script: Vec<Attempt>) -> (Self, MockHarness) {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = Self {
            script: StdMutex::new(script.into()),
            links: links_tx,
            attempts: Arc::clone(&attempts),
        };
        let harness = MockHarness {
            links: links_rx,
            attempts,
        };
        (connector, harness)
    }

    /// Accepts every connection.
    pub fn accepting() -> (Self, MockHarness) {
        Self::new(vec![Attempt::Accept; 16])
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, QuizClientError> {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        let attempt = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Refuse);
        if matches!(attempt, Attempt::Refuse) {
            return Err(QuizClientError::TransportSend("connection refused".into()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.links.send(MockLink {
            inbound: inbound_tx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        });
        Ok(MockTransport {
            pending: VecDeque::new(),
            inbound: inbound_rx,
            reply: attempt,
            sent,
            closed,
        })
    }
}

impl MockHarness {
    /// The next connection the client opened.
    pub async fn next_link(&mut self) -> MockLink {
        tokio::time::timeout(Duration::from_secs(60), self.links.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Connection attempts made so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }
}

// ── Frame and body builders ─────────────────────────────────────────

pub fn message_frame(subscription: &str, body: impl Into<String>) -> String {
    Frame::new(StompCommand::Message)
        .with_header("subscription", subscription)
        .with_header("message-id", "m-1")
        .with_body(body)
        .encode()
}

pub fn question_json(id: i64, correct: Option<&str>) -> Value {
    let mut q = json!({
        "id": id,
        "text": format!("Question {id}"),
        "options": ["A", "B", "C", "D"],
        "timeLimit": 20,
        "points": 10
    });
    if let Some(answer) = correct {
        q["correctAnswer"] = json!(answer);
    }
    q
}

/// A state body. `question_number` is one-based and sent as a zero-based index.
pub fn state_json(phase: &str, question_number: u32, question: Option<Value>) -> String {
    let mut body = json!({
        "state": phase,
        "quizId": 1,
        "totalQuestions": 2,
    });
    if question_number > 0 {
        body["currentQuestionIndex"] = json!(question_number - 1);
    }
    if let Some(q) = question {
        body["currentQuestion"] = q;
    }
    body.to_string()
}

pub fn rankings_state_json(phase: &str, question_number: u32, scores: &[(i64, i64)]) -> String {
    let rankings: Vec<Value> = scores
        .iter()
        .map(|(team_id, score)| {
            json!({"rank": 0, "teamId": team_id, "teamName": format!("Team {team_id}"), "score": score})
        })
        .collect();
    json!({
        "state": phase,
        "quizId": 1,
        "totalQuestions": 2,
        "currentQuestionIndex": question_number.saturating_sub(1),
        "rankings": rankings,
    })
    .to_string()
}

pub fn timer_json(remaining: i64) -> String {
    json!({"timeRemaining": remaining}).to_string()
}

pub fn team_json(kind: &str, team_id: i64) -> String {
    json!({"type": kind, "teamId": team_id, "teamName": format!("Team {team_id}")}).to_string()
}

pub fn submission_json(team_id: i64) -> String {
    json!({
        "teamId": team_id,
        "teamName": format!("Team {team_id}"),
        "timestamp": "2026-01-01T00:00:00Z"
    })
    .to_string()
}

/// Install a test subscriber so `RUST_LOG` works while debugging tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
