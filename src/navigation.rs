//! Phase-driven screen selection.
//!
//! Every screen listens to the phase and moves itself to the screen the phase
//! implies. [`Navigator`] is edge-triggered so that repeated broadcasts of the
//! same phase never re-navigate.

use crate::phase::GamePhase;
use crate::protocol::Role;

/// Top-level screens, shared by both roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Lobby,
    Game,
    FinalScoreboard,
}

impl Screen {
    /// Route of this screen for `role`.
    pub fn route(self, role: Role) -> &'static str {
        match (role, self) {
            (Role::Host, Self::Lobby) => "/host/lobby",
            (Role::Host, Self::Game) => "/host/game",
            (Role::Host, Self::FinalScoreboard) => "/host/scoreboard?final=true",
            (Role::Participant, Self::Lobby) => "/player/lobby",
            (Role::Participant, Self::Game) => "/player/game",
            (Role::Participant, Self::FinalScoreboard) => "/player/scoreboard?final=true",
        }
    }
}

/// The screen `phase` belongs on.
///
/// Intermediate scoreboards render inside the game screen; only final results
/// leave it. The scoreboard screen reached through its `final` marker stays
/// put even if a late broadcast still says `SCOREBOARD`.
pub fn target_screen(phase: GamePhase, is_final: bool) -> Screen {
    match phase {
        GamePhase::Lobby => Screen::Lobby,
        GamePhase::FinalResults => Screen::FinalScoreboard,
        GamePhase::Scoreboard if is_final => Screen::FinalScoreboard,
        GamePhase::Question
        | GamePhase::Buffer
        | GamePhase::AnswerReveal
        | GamePhase::Scoreboard => Screen::Game,
    }
}

/// Tracks the displayed screen and reports when it must change.
#[derive(Debug, Clone)]
pub struct Navigator {
    role: Role,
    current: Screen,
}

impl Navigator {
    /// Start on the lobby screen.
    pub fn new(role: Role) -> Self {
        Self::starting_at(role, Screen::Lobby)
    }

    pub fn starting_at(role: Role, screen: Screen) -> Self {
        Self {
            role,
            current: screen,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current(&self) -> Screen {
        self.current
    }

    pub fn current_route(&self) -> &'static str {
        self.current.route(self.role)
    }

    /// Feed the latest phase. Returns the new screen when navigation is needed.
    pub fn on_phase(&mut self, phase: GamePhase) -> Option<Screen> {
        let is_final = self.current == Screen::FinalScoreboard;
        let target = target_screen(phase, is_final);
        if target == self.current {
            return None;
        }
        self.current = target;
        Some(target)
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

    #[test]
    fn phase_to_screen_mapping() {
        assert_eq!(target_screen(GamePhase::Lobby, false), Screen::Lobby);
        for phase in [
            GamePhase::Question,
            GamePhase::Buffer,
            GamePhase::AnswerReveal,
            GamePhase::Scoreboard,
        ] {
            assert_eq!(target_screen(phase, false), Screen::Game);
        }
        assert_eq!(
            target_screen(GamePhase::FinalResults, false),
            Screen::FinalScoreboard
        );
        assert_eq!(
            target_screen(GamePhase::Scoreboard, true),
            Screen::FinalScoreboard
        );
        assert_eq!(target_screen(GamePhase::Lobby, true), Screen::Lobby);
    }

    #[test]
    fn routes_per_role() {
        assert_eq!(Screen::Game.route(Role::Host), "/host/game");
        assert_eq!(Screen::Lobby.route(Role::Participant), "/player/lobby");
        assert_eq!(
            Screen::FinalScoreboard.route(Role::Participant),
            "/player/scoreboard?final=true"
        );
    }

    #[test]
    fn navigation_is_edge_triggered() {
        let mut nav = Navigator::new(Role::Participant);
        assert_eq!(nav.on_phase(GamePhase::Lobby), None);
        assert_eq!(nav.on_phase(GamePhase::Question), Some(Screen::Game));
        assert_eq!(nav.on_phase(GamePhase::Question), None);
        assert_eq!(nav.on_phase(GamePhase::Scoreboard), None);
        assert_eq!(
            nav.on_phase(GamePhase::FinalResults),
            Some(Screen::FinalScoreboard)
        );
        assert_eq!(nav.current_route(), "/player/scoreboard?final=true");
    }

    #[test]
    fn final_scoreboard_ignores_stale_scoreboard() {
        let mut nav = Navigator::starting_at(Role::Host, Screen::FinalScoreboard);
        assert_eq!(nav.on_phase(GamePhase::Scoreboard), None);
        assert_eq!(nav.on_phase(GamePhase::Question), Some(Screen::Game));
    }

    #[test]
    fn lobby_reachable_from_any_screen() {
        let mut nav = Navigator::starting_at(Role::Host, Screen::Game);
        assert_eq!(nav.on_phase(GamePhase::Lobby), Some(Screen::Lobby));
    }
}
