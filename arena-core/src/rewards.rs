//! Post-match rewards: points awarded, health deltas, win/loss tallies.

use arena_types::{RewardDelta, MAX_HP};

use crate::match_state::{MatchOutcome, ResolvedSide};

/// Minimum score gap that counts as a blowout regardless of base points.
const BLOWOUT_FLOOR: i32 = 20;

/// Points for the winning side: at least the question's base points, more
/// if their score already exceeds that with a 15% bonus on top.
pub fn winner_points(base_points: i32, score: i32) -> i32 {
    base_points.max(score * 115 / 100)
}

/// Consolation points for the losing side. A loser who both ran out the
/// clock and lost badly gets nothing; otherwise they keep a floor of 10%
/// of base or 30% of their own score, whichever is higher.
pub fn loser_points(
    base_points: i32,
    loser: &ResolvedSide,
    winner: &ResolvedSide,
    time_limit_seconds: u32,
) -> i32 {
    if loser.forfeited {
        return 0;
    }

    let timed_out = loser.time_spent_seconds >= time_limit_seconds;
    let gap = winner.score - loser.score;
    let severe = (loser.score == 0 && winner.correct) || gap >= BLOWOUT_FLOOR.max(base_points / 2);

    if timed_out && severe {
        0
    } else {
        (base_points / 10).max(loser.score * 3 / 10)
    }
}

/// Apply a health delta, keeping the result within `[0, MAX_HP]`.
pub fn apply_hp(current: i32, delta: i32) -> i32 {
    (current + delta).clamp(0, MAX_HP)
}

/// Turn a resolved outcome into per-player state changes.
///
/// A drawn match produces no changes at all. Synthetic opponents get a
/// delta too so callers can report a complete picture, but persistence
/// skips any delta flagged `is_ai`.
pub fn resolve_rewards(outcome: &MatchOutcome) -> Vec<RewardDelta> {
    let Some(winner_id) = outcome.winner_id else {
        return Vec::new();
    };
    let Some(winner) = outcome.side(winner_id) else {
        return Vec::new();
    };

    outcome
        .sides
        .iter()
        .map(|side| {
            if side.player_id == winner_id {
                RewardDelta {
                    player_id: side.player_id,
                    is_ai: side.is_ai,
                    points: winner_points(outcome.question_points, side.score),
                    hp_delta: 1,
                    wins: 1,
                    losses: 0,
                }
            } else {
                RewardDelta {
                    player_id: side.player_id,
                    is_ai: side.is_ai,
                    points: loser_points(
                        outcome.question_points,
                        side,
                        winner,
                        outcome.time_limit_seconds,
                    ),
                    hp_delta: -1,
                    wins: 0,
                    losses: 1,
                }
            }
        })
        .collect()
}
