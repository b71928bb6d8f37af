//! Score computation for resolved submissions.

use arena_types::EvaluationResult;

/// Runtime at or beyond this many milliseconds earns no speed bonus.
const SPEED_BONUS_WINDOW_MS: f64 = 5000.0;

/// Compute the match score for one evaluated submission.
///
/// An incorrect submission scores zero regardless of speed or style.
/// A correct one scores the question's base points amplified by up to
/// 50% for speed and up to 30% for style.
pub fn match_score(base_points: i32, eval: &EvaluationResult) -> i32 {
    if !eval.correct {
        return 0;
    }

    let speed_factor = (1.0 - eval.runtime_ms as f64 / SPEED_BONUS_WINDOW_MS).max(0.0);
    let style_factor = eval.style_score.clamp(0, 100) as f64 / 100.0;
    let multiplier = 1.0 + speed_factor * 0.5 + style_factor * 0.3;

    (base_points as f64 * multiplier).floor() as i32
}

/// Nudge the human's score in battles against the synthetic opponent:
/// a 10% boost, plus one extra point if that still lands on a tie.
/// The biased value is what gets recorded and reported.
pub fn bias_against_ai(user_score: i32, ai_score: i32) -> i32 {
    let biased = user_score * 11 / 10;
    if biased == ai_score { biased + 1 } else { biased }
}
