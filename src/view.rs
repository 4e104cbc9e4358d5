//! The game view reducer.
//!
//! [`GameView`] is the single snapshot every screen renders from. It changes
//! only through [`GameView::apply`] (inbound events) and the local interaction
//! methods [`select_option`](GameView::select_option) and
//! [`submit`](GameView::submit).
//!
//! Phase transitions are entirely server-driven: the local timer reaching zero
//! never moves the phase. Each event handler reads only the fields it owns, so
//! timer and state broadcasts may arrive in either order.

use thiserror::Error;
use tracing::debug;

use crate::commands::{available_commands, AnswerSubmission};
use crate::event::{
    ClientEvent, GameEvent, StateUpdate, SubmissionRecord, TeamPresence, TimerUpdate,
};
use crate::phase::GamePhase;
use crate::protocol::{CommandType, QuestionData, TeamId};
use crate::rankings::{process_rankings, RankedEntry};

/// Remaining seconds at or below which the timer is shown as running low.
pub const LOW_TIME_SECS: u32 = 5;
/// Remaining seconds at or below which the timer is shown as critical.
pub const CRITICAL_TIME_SECS: u32 = 3;

/// Connection status as seen by the screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub connecting: bool,
    /// Last transport-level failure, kept until the next successful connection.
    pub last_error: Option<String>,
    /// Consecutive connectivity failures since the last successful connection.
    pub reconnect_attempts: u32,
}

/// Countdown for the running phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerState {
    /// Server-authoritative seconds left, never negative.
    pub time_remaining: u32,
    pub total_time: u32,
}

/// How urgently the timer should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerUrgency {
    Normal,
    Low,
    Critical,
}

impl TimerState {
    pub fn is_expired(&self) -> bool {
        self.time_remaining == 0
    }

    pub fn urgency(&self) -> TimerUrgency {
        if self.time_remaining <= CRITICAL_TIME_SECS {
            TimerUrgency::Critical
        } else if self.time_remaining <= LOW_TIME_SECS {
            TimerUrgency::Low
        } else {
            TimerUrgency::Normal
        }
    }

    /// Fraction of the phase still left, in `0.0..=1.0`. Zero when the total is unknown.
    pub fn progress(&self) -> f64 {
        if self.total_time == 0 {
            return 0.0;
        }
        (f64::from(self.time_remaining) / f64::from(self.total_time)).min(1.0)
    }
}

/// Why a local interaction was ignored.
///
/// These are UI-disable conditions rather than failures: a screen that greys
/// out its controls correctly never triggers one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("answers are not accepted during {0}")]
    WrongPhase(GamePhase),
    #[error("an answer was already submitted")]
    AlreadySubmitted,
    #[error("time is up")]
    TimeExpired,
    #[error("no option selected")]
    NoSelection,
    #[error("no question is being shown")]
    NoQuestion,
    #[error("option is not one of the current question's options")]
    UnknownOption,
    #[error("only participants submit answers")]
    NotParticipant,
}

/// The per-client view state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameView {
    connection: ConnectionState,
    phase: GamePhase,
    question: Option<QuestionData>,
    question_number: u32,
    total_questions: u32,
    timer: TimerState,
    teams: Vec<TeamPresence>,
    submissions: Vec<SubmissionRecord>,
    rankings: Vec<RankedEntry>,
    current_round: Option<String>,
    message: Option<String>,
    error_notice: Option<String>,
    selected_option: Option<String>,
    has_submitted: bool,
    is_answer_correct: Option<bool>,
}

impl GameView {
    /// A fresh view: lobby phase, disconnected, everything empty.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn question(&self) -> Option<&QuestionData> {
        self.question.as_ref()
    }

    /// One-based; 0 before the first question.
    pub fn question_number(&self) -> u32 {
        self.question_number
    }

    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    /// Connected teams in connection order.
    pub fn teams(&self) -> &[TeamPresence] {
        &self.teams
    }

    /// Host only: teams that answered the current question.
    pub fn submissions(&self) -> &[SubmissionRecord] {
        &self.submissions
    }

    /// Latest scoreboard, sorted and ranked.
    pub fn rankings(&self) -> &[RankedEntry] {
        &self.rankings
    }

    pub fn current_round(&self) -> Option<&str> {
        self.current_round.as_deref()
    }

    /// Free-form status text from the last state broadcast.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Server-pushed error awaiting dismissal.
    pub fn error_notice(&self) -> Option<&str> {
        self.error_notice.as_deref()
    }

    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    pub fn has_submitted(&self) -> bool {
        self.has_submitted
    }

    /// `None` until the reveal, and also when nothing was selected.
    pub fn is_answer_correct(&self) -> Option<bool> {
        self.is_answer_correct
    }

    /// The ranked row for `team_id`, if it appears on the scoreboard.
    pub fn my_ranking(&self, team_id: TeamId) -> Option<&RankedEntry> {
        self.rankings.iter().find(|r| r.team_id == team_id)
    }

    /// Host commands to enable for the current phase.
    pub fn available_commands(&self) -> &'static [CommandType] {
        available_commands(self.phase, self.question_number, self.total_questions)
    }

    // ── Inbound events ──────────────────────────────────────────────

    /// Fold one client event into the view.
    pub fn apply(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connecting { attempt } => self.start_attempt(attempt),
            ClientEvent::Connected => {
                self.connection = ConnectionState {
                    connected: true,
                    ..ConnectionState::default()
                };
            }
            ClientEvent::ConnectionError {
                message,
                attempts,
                terminal,
            } => {
                self.connection.connected = false;
                self.connection.connecting = !terminal;
                self.connection.last_error = Some(message);
                self.connection.reconnect_attempts = attempts;
            }
            ClientEvent::Disconnected { .. } => {
                self.connection.connected = false;
                self.connection.connecting = false;
            }
            ClientEvent::Game(game) => self.apply_game(game),
        }
    }

    /// Fold one decoded broadcast into the view.
    pub fn apply_game(&mut self, event: GameEvent) {
        match event {
            GameEvent::StateUpdate(update) => self.apply_state(*update),
            GameEvent::TimerUpdate(tick) => self.apply_timer(tick),
            GameEvent::TeamConnected(presence) => {
                if !self.teams.iter().any(|t| t.id == presence.id) {
                    self.teams.push(presence);
                }
            }
            GameEvent::TeamDisconnected { team_id } => {
                self.teams.retain(|t| t.id != team_id);
            }
            GameEvent::SubmissionReceived(record) => {
                if self.submissions.iter().any(|s| s.team_id == record.team_id) {
                    debug!(team_id = record.team_id, "duplicate submission notice ignored");
                } else {
                    self.submissions.push(record);
                }
            }
            GameEvent::ErrorNotice(text) => self.error_notice = Some(text),
        }
    }

    fn apply_state(&mut self, update: StateUpdate) {
        let question_number = update.question_number.unwrap_or(self.question_number);
        if question_number != self.question_number {
            self.selected_option = None;
            self.has_submitted = false;
            self.is_answer_correct = None;
            self.submissions.clear();
        }

        self.phase = update.phase;
        self.question_number = question_number;
        self.total_questions = update.total_questions;
        self.question = update.current_question;
        self.current_round = update.current_round;
        self.message = update.message;
        self.timer.time_remaining = update.time_remaining;

        if let Some(question) = &self.question {
            if update.phase == GamePhase::Question {
                self.timer.total_time = question.time_limit;
            }
            if update.phase == GamePhase::AnswerReveal {
                if let (Some(selected), Some(correct)) =
                    (&self.selected_option, &question.correct_answer)
                {
                    self.is_answer_correct = Some(selected == correct);
                }
            }
        }

        if update.phase.carries_rankings() {
            self.rankings = process_rankings(&update.rankings);
        }
    }

    fn apply_timer(&mut self, tick: TimerUpdate) {
        self.timer.time_remaining = tick.time_remaining;
        if let Some(total) = tick.total_time.filter(|t| *t > 0) {
            self.timer.total_time = total;
        }
    }

    // ── Local interaction ───────────────────────────────────────────

    /// Check whether an option may be selected right now.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] that applies.
    pub fn can_select(&self) -> Result<(), Rejection> {
        if self.phase != GamePhase::Question {
            return Err(Rejection::WrongPhase(self.phase));
        }
        if self.has_submitted {
            return Err(Rejection::AlreadySubmitted);
        }
        if self.timer.is_expired() {
            return Err(Rejection::TimeExpired);
        }
        Ok(())
    }

    /// Highlight `option` as the team's answer.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] and leaves the view untouched when selection is
    /// not allowed or `option` is not an option of the current question.
    pub fn select_option(&mut self, option: &str) -> Result<(), Rejection> {
        self.can_select()?;
        let question = self.question.as_ref().ok_or(Rejection::NoQuestion)?;
        if !question.options.iter().any(|o| o == option) {
            return Err(Rejection::UnknownOption);
        }
        self.selected_option = Some(option.to_string());
        Ok(())
    }

    /// Check whether the selected option may be submitted right now.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] that applies.
    pub fn can_submit(&self) -> Result<(), Rejection> {
        self.can_select()?;
        if self.selected_option.is_none() {
            return Err(Rejection::NoSelection);
        }
        if self.question.is_none() {
            return Err(Rejection::NoQuestion);
        }
        Ok(())
    }

    /// Lock in the selected option and return the submission to send.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] and leaves the view untouched when submitting is
    /// not allowed.
    pub fn submit(&mut self, team_id: TeamId) -> Result<AnswerSubmission, Rejection> {
        self.can_submit()?;
        let (Some(question), Some(selected)) = (&self.question, &self.selected_option) else {
            return Err(Rejection::NoSelection);
        };
        let submission = AnswerSubmission {
            team_id,
            question_id: question.id,
            selected_option: selected.clone(),
        };
        self.has_submitted = true;
        Ok(submission)
    }

    /// Clear the server-pushed error banner.
    pub fn dismiss_notice(&mut self) {
        self.error_notice = None;
    }

    /// Return the connection portion to its initial values.
    pub fn reset_connection(&mut self) {
        self.connection = ConnectionState::default();
    }

    /// Every connection attempt starts from an empty game; only the
    /// connection status carries over.
    fn start_attempt(&mut self, attempt: u32) {
        let connection = ConnectionState {
            connected: false,
            connecting: true,
            reconnect_attempts: attempt,
            last_error: self.connection.last_error.take(),
        };
        *self = Self {
            connection,
            ..Self::default()
        };
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
    use crate::protocol::RankingEntry;
    use chrono::Utc;

    fn question(id: i64, correct: Option<&str>) -> QuestionData {
        QuestionData {
            id,
            text: format!("question {id}"),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            time_limit: 20,
            points: 10,
            correct_answer: correct.map(Into::into),
        }
    }

    fn state(phase: GamePhase, number: u32, q: Option<QuestionData>) -> GameEvent {
        let mut update = StateUpdate::new(phase);
        update.question_number = Some(number);
        update.total_questions = 2;
        update.time_remaining = if phase == GamePhase::Question { 20 } else { 0 };
        update.current_question = q;
        GameEvent::StateUpdate(Box::new(update))
    }

    fn in_question() -> GameView {
        let mut view = GameView::new();
        view.apply_game(state(GamePhase::Question, 1, Some(question(1, None))));
        view
    }

    fn presence(id: TeamId) -> TeamPresence {
        TeamPresence {
            id,
            name: format!("team {id}"),
            connected_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_view_is_lobby_and_disconnected() {
        let view = GameView::new();
        assert_eq!(view.phase(), GamePhase::Lobby);
        assert!(!view.connection().connected);
        assert!(view.question().is_none());
        assert_eq!(view.available_commands(), [CommandType::StartRound]);
    }

    #[test]
    fn phase_follows_the_latest_state_update() {
        let mut view = GameView::new();
        for phase in [
            GamePhase::Question,
            GamePhase::Lobby,
            GamePhase::FinalResults,
            GamePhase::Buffer,
        ] {
            view.apply_game(state(phase, 1, None));
            assert_eq!(view.phase(), phase);
        }
    }

    #[test]
    fn timer_never_changes_phase() {
        let mut view = in_question();
        view.apply_game(GameEvent::TimerUpdate(TimerUpdate {
            time_remaining: 0,
            total_time: None,
        }));
        assert_eq!(view.phase(), GamePhase::Question);
        assert!(view.timer().is_expired());
        assert_eq!(view.timer().total_time, 20);
    }

    #[test]
    fn selection_rules() {
        let mut view = in_question();
        assert_eq!(view.select_option("Z"), Err(Rejection::UnknownOption));
        assert!(view.select_option("B").is_ok());
        assert_eq!(view.selected_option(), Some("B"));
        assert!(view.select_option("C").is_ok());
        assert_eq!(view.selected_option(), Some("C"));
    }

    #[test]
    fn interactions_are_rejected_outside_question_phase() {
        for phase in [
            GamePhase::Lobby,
            GamePhase::Buffer,
            GamePhase::AnswerReveal,
            GamePhase::Scoreboard,
            GamePhase::FinalResults,
        ] {
            let mut view = GameView::new();
            view.apply_game(state(phase, 1, Some(question(1, None))));
            let before = view.clone();
            assert_eq!(view.select_option("A"), Err(Rejection::WrongPhase(phase)));
            assert_eq!(view.submit(1), Err(Rejection::WrongPhase(phase)));
            assert_eq!(view, before);
        }
    }

    #[test]
    fn interactions_are_rejected_when_time_is_up() {
        let mut view = in_question();
        view.select_option("A").unwrap();
        view.apply_game(GameEvent::TimerUpdate(TimerUpdate {
            time_remaining: 0,
            total_time: None,
        }));
        let before = view.clone();
        assert_eq!(view.select_option("B"), Err(Rejection::TimeExpired));
        assert_eq!(view.submit(1), Err(Rejection::TimeExpired));
        assert_eq!(view, before);
    }

    #[test]
    fn submit_requires_selection_and_happens_once() {
        let mut view = in_question();
        assert_eq!(view.submit(4), Err(Rejection::NoSelection));
        view.select_option("D").unwrap();
        let submission = view.submit(4).unwrap();
        assert_eq!(submission.team_id, 4);
        assert_eq!(submission.question_id, 1);
        assert_eq!(submission.selected_option, "D");
        assert!(view.has_submitted());

        let before = view.clone();
        assert_eq!(view.submit(4), Err(Rejection::AlreadySubmitted));
        assert_eq!(view.select_option("A"), Err(Rejection::AlreadySubmitted));
        assert_eq!(view, before);
    }

    #[test]
    fn reveal_marks_answer_correctness() {
        let mut view = in_question();
        view.select_option("A").unwrap();
        view.submit(1).unwrap();
        view.apply_game(state(GamePhase::AnswerReveal, 1, Some(question(1, Some("A")))));
        assert_eq!(view.is_answer_correct(), Some(true));

        let mut view = in_question();
        view.select_option("B").unwrap();
        view.apply_game(state(GamePhase::AnswerReveal, 1, Some(question(1, Some("A")))));
        assert_eq!(view.is_answer_correct(), Some(false));
    }

    #[test]
    fn reveal_without_selection_stays_unknown() {
        let mut view = in_question();
        view.apply_game(state(GamePhase::AnswerReveal, 1, Some(question(1, Some("A")))));
        assert_eq!(view.is_answer_correct(), None);
    }

    #[test]
    fn new_question_number_resets_interaction_state() {
        let mut view = in_question();
        view.select_option("A").unwrap();
        view.submit(1).unwrap();
        view.apply_game(GameEvent::SubmissionReceived(SubmissionRecord {
            team_id: 1,
            team_name: "team 1".into(),
            timestamp: "t".into(),
        }));
        view.apply_game(state(GamePhase::AnswerReveal, 1, Some(question(1, Some("B")))));
        assert_eq!(view.is_answer_correct(), Some(false));

        view.apply_game(state(GamePhase::Question, 2, Some(question(2, None))));
        assert_eq!(view.selected_option(), None);
        assert!(!view.has_submitted());
        assert_eq!(view.is_answer_correct(), None);
        assert!(view.submissions().is_empty());
    }

    #[test]
    fn reveal_without_question_number_grades_the_submission() {
        let mut view = in_question();
        view.select_option("B").unwrap();
        view.submit(1).unwrap();

        let mut reveal = StateUpdate::new(GamePhase::AnswerReveal);
        reveal.current_question = Some(question(1, Some("A")));
        view.apply_game(GameEvent::StateUpdate(Box::new(reveal)));

        assert_eq!(view.question_number(), 1);
        assert_eq!(view.selected_option(), Some("B"));
        assert!(view.has_submitted());
        assert_eq!(view.is_answer_correct(), Some(false));
    }

    #[test]
    fn same_question_number_keeps_selection() {
        let mut view = in_question();
        view.select_option("C").unwrap();
        view.apply_game(state(GamePhase::Question, 1, Some(question(1, None))));
        assert_eq!(view.selected_option(), Some("C"));
    }

    #[test]
    fn scoreboard_replaces_rankings_wholesale() {
        let mut view = GameView::new();
        let mut update = StateUpdate::new(GamePhase::Scoreboard);
        update.rankings = vec![
            RankingEntry {
                rank: None,
                team_id: 1,
                team_name: "one".into(),
                score: 0,
            },
            RankingEntry {
                rank: None,
                team_id: 2,
                team_name: "two".into(),
                score: 10,
            },
        ];
        view.apply_game(GameEvent::StateUpdate(Box::new(update)));
        assert_eq!(view.rankings().len(), 2);
        assert_eq!(view.my_ranking(2).unwrap().display_rank, 1);
        assert_eq!(view.my_ranking(1).unwrap().display_rank, 2);

        let mut update = StateUpdate::new(GamePhase::FinalResults);
        update.rankings = vec![RankingEntry {
            rank: None,
            team_id: 3,
            team_name: "three".into(),
            score: 5,
        }];
        view.apply_game(GameEvent::StateUpdate(Box::new(update)));
        assert_eq!(view.rankings().len(), 1);
        assert!(view.my_ranking(1).is_none());
    }

    #[test]
    fn question_phase_keeps_last_rankings() {
        let mut view = GameView::new();
        let mut update = StateUpdate::new(GamePhase::Scoreboard);
        update.rankings = vec![RankingEntry {
            rank: Some(1),
            team_id: 1,
            team_name: "one".into(),
            score: 3,
        }];
        view.apply_game(GameEvent::StateUpdate(Box::new(update)));
        view.apply_game(state(GamePhase::Question, 2, Some(question(2, None))));
        assert_eq!(view.rankings().len(), 1);
    }

    #[test]
    fn presence_is_idempotent() {
        let mut view = GameView::new();
        view.apply_game(GameEvent::TeamConnected(presence(5)));
        view.apply_game(GameEvent::TeamConnected(presence(5)));
        assert_eq!(view.teams().len(), 1);

        view.apply_game(GameEvent::TeamDisconnected { team_id: 9 });
        assert_eq!(view.teams().len(), 1);
        view.apply_game(GameEvent::TeamDisconnected { team_id: 5 });
        assert!(view.teams().is_empty());
    }

    #[test]
    fn submissions_dedupe_by_team() {
        let mut view = in_question();
        let record = SubmissionRecord {
            team_id: 3,
            team_name: "three".into(),
            timestamp: "t".into(),
        };
        view.apply_game(GameEvent::SubmissionReceived(record.clone()));
        view.apply_game(GameEvent::SubmissionReceived(record));
        assert_eq!(view.submissions().len(), 1);
    }

    #[test]
    fn error_notice_leaves_phase_and_connection_alone() {
        let mut view = in_question();
        view.apply(ClientEvent::Connected);
        view.apply_game(GameEvent::ErrorNotice("Submission rejected".into()));
        assert_eq!(view.error_notice(), Some("Submission rejected"));
        assert_eq!(view.phase(), GamePhase::Question);
        assert!(view.connection().connected);
        view.dismiss_notice();
        assert!(view.error_notice().is_none());
    }

    #[test]
    fn connection_lifecycle() {
        let mut view = GameView::new();
        view.apply(ClientEvent::Connecting { attempt: 0 });
        assert!(view.connection().connecting);

        view.apply(ClientEvent::ConnectionError {
            message: "refused".into(),
            attempts: 1,
            terminal: false,
        });
        assert!(view.connection().connecting);
        assert_eq!(view.connection().reconnect_attempts, 1);

        view.apply(ClientEvent::Connected);
        assert_eq!(
            *view.connection(),
            ConnectionState {
                connected: true,
                connecting: false,
                last_error: None,
                reconnect_attempts: 0,
            }
        );

        view.apply(ClientEvent::ConnectionError {
            message: "gave up".into(),
            attempts: 10,
            terminal: true,
        });
        assert!(!view.connection().connecting);
        assert_eq!(view.connection().last_error.as_deref(), Some("gave up"));

        view.reset_connection();
        assert_eq!(*view.connection(), ConnectionState::default());
    }

    #[test]
    fn each_connection_attempt_starts_from_an_empty_game() {
        let mut view = in_question();
        view.select_option("A").unwrap();
        view.submit(1).unwrap();
        view.apply_game(GameEvent::ErrorNotice("late".into()));
        view.apply(ClientEvent::ConnectionError {
            message: "reset by peer".into(),
            attempts: 1,
            terminal: false,
        });

        view.apply(ClientEvent::Connecting { attempt: 1 });

        let mut expected = GameView::new();
        expected.connection = ConnectionState {
            connected: false,
            connecting: true,
            last_error: Some("reset by peer".into()),
            reconnect_attempts: 1,
        };
        assert_eq!(view, expected);
        assert_eq!(view.phase(), GamePhase::Lobby);
        assert_eq!(view.select_option("A"), Err(Rejection::WrongPhase(GamePhase::Lobby)));
    }

    #[test]
    fn timer_urgency_and_progress() {
        let timer = TimerState {
            time_remaining: 10,
            total_time: 20,
        };
        assert_eq!(timer.urgency(), TimerUrgency::Normal);
        assert!((timer.progress() - 0.5).abs() < f64::EPSILON);

        let low = TimerState {
            time_remaining: 5,
            total_time: 20,
        };
        assert_eq!(low.urgency(), TimerUrgency::Low);

        let critical = TimerState {
            time_remaining: 3,
            total_time: 0,
        };
        assert_eq!(critical.urgency(), TimerUrgency::Critical);
        assert_eq!(critical.progress(), 0.0);
    }

    #[test]
    fn scoreboard_commands_depend_on_remaining_questions() {
        let mut view = GameView::new();
        view.apply_game(state(GamePhase::Scoreboard, 1, None));
        assert_eq!(view.available_commands(), [CommandType::NextQuestion]);
        view.apply_game(state(GamePhase::Scoreboard, 2, None));
        assert_eq!(view.available_commands(), [CommandType::EndQuiz]);
    }
}
