//! Points for a solved room: base + time bonus - hint penalty.

use crate::puzzle::Puzzle;

pub const DEFAULT_PAR_TIME_SECONDS: u32 = 60;
pub const DEFAULT_HINT_PENALTY: u32 = 10;

/// `floor(points + max(0, par - seconds) / 2) - hints * penalty`.
///
/// Par defaults to 60 s and the penalty to 10 per hint; a room's `[scoring]`
/// table can override both. The result is not clamped and may be negative.
pub fn score(puzzle: &Puzzle, seconds_elapsed: f64, hints_used: u32) -> i64 {
    let scoring = puzzle.scoring.as_ref();
    let par = scoring
        .and_then(|s| s.par_time_seconds)
        .unwrap_or(DEFAULT_PAR_TIME_SECONDS);
    let penalty = scoring
        .and_then(|s| s.hint_penalty)
        .unwrap_or(DEFAULT_HINT_PENALTY);

    let seconds = if seconds_elapsed.is_nan() { 0.0 } else { seconds_elapsed };
    let time_bonus = (f64::from(par) - seconds).max(0.0) / 2.0;
    let earned = (f64::from(puzzle.points) + time_bonus).floor() as i64;

    earned - i64::from(hints_used) * i64::from(penalty)
}
