//! Scoreboard ordering with competition ranking.
//!
//! Ranks are always recomputed from scores; the server's `rank` field is
//! ignored. Tied teams share a rank and the next lower score skips the ranks
//! the tie consumed: scores `100, 100, 50` rank `1, 1, 3`.

use crate::protocol::{RankingEntry, TeamId};

/// Highest display rank that receives podium styling.
pub const PODIUM_RANKS: u32 = 3;

/// A ranking row ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub team_id: TeamId,
    pub team_name: String,
    pub score: i64,
    /// One-based competition rank.
    pub display_rank: u32,
}

impl RankedEntry {
    /// Whether this row gets podium styling. With ties at the top more than
    /// three rows can qualify.
    pub fn is_top_three(&self) -> bool {
        self.display_rank <= PODIUM_RANKS
    }
}

/// Sort by score descending and assign competition ranks.
///
/// The sort is stable, so tied teams keep their broadcast order.
pub fn process_rankings(entries: &[RankingEntry]) -> Vec<RankedEntry> {
    let mut sorted: Vec<&RankingEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    let mut ranked: Vec<RankedEntry> = Vec::with_capacity(sorted.len());
    for (position, entry) in sorted.into_iter().enumerate() {
        let display_rank = match ranked.last() {
            Some(prev) if prev.score == entry.score => prev.display_rank,
            _ => u32::try_from(position + 1).unwrap_or(u32::MAX),
        };
        ranked.push(RankedEntry {
            team_id: entry.team_id,
            team_name: entry.team_name.clone(),
            score: entry.score,
            display_rank,
        });
    }
    ranked
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

    fn entry(team_id: TeamId, score: i64) -> RankingEntry {
        RankingEntry {
            rank: None,
            team_id,
            team_name: format!("team-{team_id}"),
            score,
        }
    }

    fn ranks(entries: &[RankingEntry]) -> Vec<u32> {
        process_rankings(entries)
            .iter()
            .map(|e| e.display_rank)
            .collect()
    }

    #[test]
    fn ties_share_rank_and_consume_positions() {
        assert_eq!(ranks(&[entry(1, 100), entry(2, 100), entry(3, 50)]), [1, 1, 3]);
        assert_eq!(
            ranks(&[entry(1, 9), entry(2, 7), entry(3, 7), entry(4, 7), entry(5, 1)]),
            [1, 2, 2, 2, 5]
        );
    }

    #[test]
    fn output_is_sorted_descending() {
        let out = process_rankings(&[entry(1, 0), entry(2, 10), entry(3, 5)]);
        let ids: Vec<TeamId> = out.iter().map(|e| e.team_id).collect();
        assert_eq!(ids, [2, 3, 1]);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn server_rank_is_ignored() {
        let mut wrong = entry(1, 0);
        wrong.rank = Some(1);
        let out = process_rankings(&[wrong, entry(2, 10)]);
        assert_eq!(out[0].team_id, 2);
        assert_eq!(out[0].display_rank, 1);
        assert_eq!(out[1].display_rank, 2);
    }

    #[test]
    fn ties_keep_broadcast_order() {
        let out = process_rankings(&[entry(7, 3), entry(4, 3)]);
        assert_eq!(out[0].team_id, 7);
        assert_eq!(out[1].team_id, 4);
    }

    #[test]
    fn podium_follows_display_rank_not_position() {
        let out = process_rankings(&[
            entry(1, 10),
            entry(2, 10),
            entry(3, 10),
            entry(4, 10),
            entry(5, 1),
        ]);
        assert_eq!(out.iter().filter(|e| e.is_top_three()).count(), 4);
        assert!(!out[4].is_top_three());
    }

    #[test]
    fn empty_input() {
        assert!(process_rankings(&[]).is_empty());
    }

    #[test]
    fn pseudo_random_inputs_hold_ranking_properties() {
        // Deterministic LCG.
        let mut seed: u64 = 0x5eed;
        for _ in 0..200 {
            let len = (seed % 12) as usize;
            let entries: Vec<RankingEntry> = (0..len)
                .map(|i| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    entry(i as TeamId, ((seed >> 33) % 5) as i64 * 10)
                })
                .collect();
            seed = seed.wrapping_add(17);

            let out = process_rankings(&entries);
            assert_eq!(out.len(), entries.len());
            for (i, row) in out.iter().enumerate() {
                if i == 0 {
                    assert_eq!(row.display_rank, 1);
                    continue;
                }
                let prev = &out[i - 1];
                assert!(prev.score >= row.score);
                if prev.score == row.score {
                    assert_eq!(prev.display_rank, row.display_rank);
                } else {
                    assert_eq!(row.display_rank as usize, i + 1);
                }
            }
        }
    }
}
