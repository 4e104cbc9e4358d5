//! Canonical game phases.
//!
//! The server has used several names for the same stage over time. They are
//! folded into the six variants of [`GamePhase`] when a frame is decoded, so
//! nothing downstream of the decoder ever matches on a raw string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-declared stage of the current question cycle.
///
/// `Lobby → Question → Buffer → AnswerReveal → Scoreboard → (Question | FinalResults)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Lobby,
    Question,
    /// Between timer expiry and the answer reveal; display only.
    Buffer,
    AnswerReveal,
    Scoreboard,
    /// Terminal: no further question cycles.
    FinalResults,
}

impl GamePhase {
    /// All canonical phases in cycle order.
    pub const ALL: [GamePhase; 6] = [
        GamePhase::Lobby,
        GamePhase::Question,
        GamePhase::Buffer,
        GamePhase::AnswerReveal,
        GamePhase::Scoreboard,
        GamePhase::FinalResults,
    ];

    /// Map a wire name, including legacy aliases, to its canonical phase.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn normalize(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        Some(match upper.as_str() {
            "LOBBY" => Self::Lobby,
            "QUESTION" | "ACTIVE" | "TIEBREAKER" => Self::Question,
            "BUFFER" | "GRADING" => Self::Buffer,
            "ANSWER_REVEAL" | "REVEAL" => Self::AnswerReveal,
            "SCOREBOARD" | "ROUND_SUMMARY" => Self::Scoreboard,
            "FINAL_RESULTS" | "ENDED" => Self::FinalResults,
            _ => return None,
        })
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "LOBBY",
            Self::Question => "QUESTION",
            Self::Buffer => "BUFFER",
            Self::AnswerReveal => "ANSWER_REVEAL",
            Self::Scoreboard => "SCOREBOARD",
            Self::FinalResults => "FINAL_RESULTS",
        }
    }

    /// Whether the correct answer of the current question may be known.
    pub fn reveals_answer(self) -> bool {
        matches!(
            self,
            Self::AnswerReveal | Self::Scoreboard | Self::FinalResults
        )
    }

    /// Whether a ranking list accompanies this phase.
    pub fn carries_rankings(self) -> bool {
        matches!(self, Self::Scoreboard | Self::FinalResults)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a phase name matches neither a canonical phase nor an alias.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game phase {0:?}")]
pub struct UnknownPhase(pub String);

impl FromStr for GamePhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for GamePhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
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
    fn canonical_names_round_trip() {
        for phase in GamePhase::ALL {
            assert_eq!(GamePhase::normalize(phase.as_str()), Some(phase));
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
            let back: GamePhase = serde_json::from_str(&json).unwrap();
            assert_eq!(back, phase);
        }
    }

    #[test]
    fn legacy_aliases_fold_to_canonical_phases() {
        assert_eq!(GamePhase::normalize("ACTIVE"), Some(GamePhase::Question));
        assert_eq!(GamePhase::normalize("TIEBREAKER"), Some(GamePhase::Question));
        assert_eq!(GamePhase::normalize("GRADING"), Some(GamePhase::Buffer));
        assert_eq!(GamePhase::normalize("REVEAL"), Some(GamePhase::AnswerReveal));
        assert_eq!(GamePhase::normalize("ROUND_SUMMARY"), Some(GamePhase::Scoreboard));
        assert_eq!(GamePhase::normalize("ENDED"), Some(GamePhase::FinalResults));
    }

    #[test]
    fn normalization_ignores_case_and_whitespace() {
        assert_eq!(GamePhase::normalize(" answer_reveal "), Some(GamePhase::AnswerReveal));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(GamePhase::normalize("INTERMISSION"), None);
        assert!("".parse::<GamePhase>().is_err());
        assert!(serde_json::from_str::<GamePhase>("\"NOPE\"").is_err());
    }

    #[test]
    fn answer_visibility_by_phase() {
        assert!(!GamePhase::Lobby.reveals_answer());
        assert!(!GamePhase::Question.reveals_answer());
        assert!(!GamePhase::Buffer.reveals_answer());
        assert!(GamePhase::AnswerReveal.reveals_answer());
        assert!(GamePhase::FinalResults.reveals_answer());
    }
}
