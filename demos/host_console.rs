//! # Quiz Console
//!
//! A terminal client for a live quiz, for either role:
//!
//! 1. Resolve an access code (proctor PIN or team code) into a session
//! 2. Remember that session in a file so a restart rejoins the same game
//! 3. Connect over STOMP/WebSocket and print phase changes and navigation
//! 4. Read commands from stdin: host controls, or an answer option
//!
//! ## Running
//!
//! ```sh
//! # Backend on localhost:8090, then:
//! cargo run --example host_console -- 4321
//!
//! # Reuse the stored session:
//! cargo run --example host_console
//!
//! # Override endpoints:
//! QUIZ_API_URL=http://quiz:8090 QUIZ_WS_URL=ws://quiz:8090/ws/quiz/websocket \
//!     cargo run --example host_console -- 4321
//! ```
//!
//! Host input: `start [ROUND]`, `pause`, `resume`, `leaderboard`, `next`,
//! `end`, `reconnect`, `quit`. Participant input: an option text to answer,
//! `reconnect`, `quit`.

use quiz_live_client::{
    ClientEvent, FileStorage, GameEvent, GamePhase, HostCommand, HttpAccessResolver, QuizClientConfig,
    QuizSession, Role, SessionStore, WebSocketConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const SESSION_FILE_ENV: &str = "QUIZ_SESSION_FILE";
const DEFAULT_SESSION_FILE: &str = ".quiz-session.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Session ─────────────────────────────────────────────────────
    let path = std::env::var(SESSION_FILE_ENV).unwrap_or_else(|_| DEFAULT_SESSION_FILE.into());
    let mut store = SessionStore::with_storage(FileStorage::new(path));

    let session = match std::env::args().nth(1) {
        Some(code) => {
            let resolver = match std::env::var("QUIZ_API_URL") {
                Ok(url) => HttpAccessResolver::new(&url),
                Err(_) => HttpAccessResolver::default(),
            };
            let session = resolver.resolve_session(code.trim()).await?;
            store.save(session)?
        }
        None => match store.load()? {
            Some(session) => session,
            None => {
                eprintln!("usage: host_console <access code>");
                return Ok(());
            }
        },
    };
    println!(
        "joining quiz {} as {:?} ({})",
        session.quiz_id(),
        session.role(),
        session.display_name()
    );

    // ── Connect ─────────────────────────────────────────────────────
    let config = QuizClientConfig::from_env();
    let connector = WebSocketConnector::new(config.url.clone());
    let mut quiz = QuizSession::start(connector, config, session);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            update = quiz.next_event() => {
                let Some(update) = update else { break };
                report(&quiz, &update.event);
                if let Some(screen) = update.navigate_to {
                    println!("-> {}", screen.route(quiz.session().role()));
                }
                if let ClientEvent::ConnectionError { terminal: true, .. } = update.event {
                    println!("connection lost; type `reconnect` to retry");
                }
            }

            line = input.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "quit" => break,
                    "reconnect" => quiz.reconnect().await,
                    other => handle_input(&mut quiz, other),
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    quiz.disconnect().await;
    // A finished game is not rejoinable.
    if quiz.view().phase() == GamePhase::FinalResults {
        store.clear()?;
    }
    Ok(())
}

fn handle_input(quiz: &mut QuizSession<WebSocketConnector>, line: &str) {
    match quiz.session().role() {
        Role::Host => {
            let mut words = line.split_whitespace();
            let command = match words.next() {
                Some("start") => HostCommand::start_round(words.next().unwrap_or("EASY")),
                Some("pause") => HostCommand::Pause,
                Some("resume") => HostCommand::Resume,
                Some("leaderboard") => HostCommand::ViewLeaderboard,
                Some("next") => HostCommand::NextQuestion,
                Some("end") => HostCommand::EndQuiz,
                Some("tiebreaker") => HostCommand::StartTiebreaker,
                _ => {
                    println!("unknown command {line:?}");
                    return;
                }
            };
            if !quiz.view().available_commands().contains(&command.kind()) {
                println!("{:?} is not offered in {}", command.kind(), quiz.view().phase());
            }
            quiz.send_command(command);
        }
        Role::Participant => {
            let answered = quiz.select_option(line).and_then(|()| quiz.submit());
            match answered {
                Ok(()) => println!("answered {line}"),
                Err(rejection) => println!("cannot answer: {rejection}"),
            }
        }
    }
}

fn report(quiz: &QuizSession<WebSocketConnector>, event: &ClientEvent) {
    let view = quiz.view();
    match event {
        ClientEvent::Connecting { attempt } => println!("connecting (attempt {attempt})"),
        ClientEvent::Connected => println!("connected"),
        ClientEvent::ConnectionError { message, .. } => println!("connection error: {message}"),
        ClientEvent::Disconnected { reason } => {
            println!("disconnected: {}", reason.as_deref().unwrap_or("-"));
        }
        ClientEvent::Game(GameEvent::StateUpdate(update)) => {
            println!(
                "{} ({}/{})",
                update.phase,
                view.question_number(),
                update.total_questions
            );
            if let Some(question) = view.question() {
                println!("  {}", question.text);
                for option in &question.options {
                    println!("   - {option}");
                }
            }
            if let Some(correct) = view.is_answer_correct() {
                println!("  {}", if correct { "correct!" } else { "wrong" });
            }
            for entry in view.rankings() {
                println!(
                    "  #{} {} {}",
                    entry.display_rank, entry.team_name, entry.score
                );
            }
            if quiz.session().role() == Role::Host {
                println!("  commands: {:?}", view.available_commands());
            }
        }
        ClientEvent::Game(GameEvent::TimerUpdate(tick)) => {
            if tick.time_remaining <= quiz_live_client::view::LOW_TIME_SECS {
                println!("  {}s left", tick.time_remaining);
            }
        }
        ClientEvent::Game(GameEvent::TeamConnected(team)) => println!("+ {}", team.name),
        ClientEvent::Game(GameEvent::TeamDisconnected { team_id }) => {
            println!("- team {team_id}");
        }
        ClientEvent::Game(GameEvent::SubmissionReceived(record)) => {
            println!(
                "  {} answered ({}/{})",
                record.team_name,
                view.submissions().len(),
                view.teams().len()
            );
        }
        ClientEvent::Game(GameEvent::ErrorNotice(text)) => println!("! {text}"),
    }
}
