//! Time management — convert a clock and a difficulty tier into search limits.
//!
//! Unlike a one-shot UCI `go` parser, this tracker carries state across moves:
//! a nodes-per-second estimate, an effective branching factor estimate, and a
//! cumulative drift term so a run of moves that finished faster (or slower)
//! than planned nudges subsequent moves back toward the intended pace.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::search::control::SearchControl;
use crate::search::difficulty::AIDifficulty;

/// Wall-clock state handed to the time manager: remaining time and the
/// increment awarded after the move completes.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub time_remaining_ms: u64,
    pub increment_ms: u64,
}

const EBF_MIN: f64 = 1.5;
const EBF_MAX: f64 = 5.0;
const EMA_ALPHA: f64 = 0.3;
const ITERATION_SAFETY_FACTOR: f64 = 0.8;
const MAX_DRIFT_CORRECTION: f64 = 0.30;

/// Tracks nodes-per-second, effective branching factor, and move-pacing
/// drift across the lifetime of one engine instance.
pub struct TimeManager {
    nps_ema: Option<f64>,
    ebf_ema: Option<f64>,
    cumulative_drift_ms: f64,
}

impl TimeManager {
    /// A tracker with no history; the first move falls back to the base
    /// allocation with no EMA-driven continuation estimate.
    pub fn new() -> Self {
        Self { nps_ema: None, ebf_ema: None, cumulative_drift_ms: 0.0 }
    }

    /// Soft/hard limits for the next move, scaled by `difficulty`.
    ///
    /// `base = (T + (moves_remaining - 1) * inc) / moves_remaining`, where
    /// `moves_remaining` is a decreasing heuristic floored at 20 so the
    /// allocation doesn't balloon late in a long game. `soft` applies the
    /// difficulty multiplier and the accumulated drift correction; `hard` is
    /// `min(2 * soft, T * 0.5)` so a single move can never exhaust the clock.
    pub fn compute_limits(&self, clock: Clock, difficulty: AIDifficulty, moves_played: u32) -> (Duration, Duration) {
        let profile = difficulty.profile();
        let t = clock.time_remaining_ms as f64;
        let inc = clock.increment_ms as f64;

        if t < 10.0 {
            return (Duration::from_millis(1), Duration::from_millis(1));
        }

        let moves_remaining = expected_moves_remaining(moves_played);
        let base = (t + (moves_remaining - 1.0) * inc) / moves_remaining;

        let drift_correction = (self.cumulative_drift_ms / base.max(1.0)).clamp(-MAX_DRIFT_CORRECTION, MAX_DRIFT_CORRECTION);
        let soft = base * profile.time_multiplier * (1.0 - drift_correction);
        let soft = soft.max(1.0).min(t);
        let hard = (2.0 * soft).min(t * 0.5).max(1.0);

        (Duration::from_millis(soft as u64), Duration::from_millis(hard as u64))
    }

    /// Whether another iteration is worth starting: the next iteration's
    /// expected duration, estimated from the EBF and NPS EMAs, must still
    /// fit under the soft limit with a safety margin.
    pub fn should_continue_iterating(&self, elapsed: Duration, nodes_last_iteration: u64, soft: Duration) -> bool {
        let elapsed_ms = elapsed.as_millis() as f64;
        if elapsed_ms >= soft.as_millis() as f64 {
            return false;
        }
        let expected_next_ms = self.expected_next_iteration_ms(nodes_last_iteration);
        elapsed_ms + expected_next_ms * ITERATION_SAFETY_FACTOR.recip() <= soft.as_millis() as f64
    }

    fn expected_next_iteration_ms(&self, nodes_last_iteration: u64) -> f64 {
        let nps = self.nps_ema.unwrap_or(1_000_000.0).max(1.0);
        let ebf = self.ebf_ema.unwrap_or(2.5);
        (nodes_last_iteration as f64 * ebf / nps) * 1000.0
    }

    /// Fold in the just-completed iteration's timing to update the NPS and
    /// EBF EMAs.
    pub fn record_iteration(&mut self, nodes: u64, elapsed: Duration, prev_nodes: Option<u64>) {
        let elapsed_secs = elapsed.as_secs_f64().max(0.000_001);
        let nps = nodes as f64 / elapsed_secs;
        self.nps_ema = Some(blend(self.nps_ema, nps));

        if let Some(prev) = prev_nodes {
            if prev > 0 {
                let ebf = (nodes as f64 / prev as f64).clamp(EBF_MIN, EBF_MAX);
                self.ebf_ema = Some(blend(self.ebf_ema, ebf));
            }
        }
    }

    /// Fold in how far a completed move's actual think time missed its
    /// planned soft limit, feeding the drift correction into future calls.
    pub fn record_move_completion(&mut self, planned_soft: Duration, actual: Duration) {
        let delta = actual.as_millis() as f64 - planned_soft.as_millis() as f64;
        self.cumulative_drift_ms += delta;
    }

    /// The current nodes-per-second EMA, if any iteration has been recorded.
    /// Exposed crate-wide only to let other modules' tests confirm the
    /// history is actually being fed during a real search.
    #[cfg(test)]
    pub(crate) fn nps_ema_for_test(&self) -> Option<f64> {
        self.nps_ema
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}

fn blend(prev: Option<f64>, sample: f64) -> f64 {
    match prev {
        Some(p) => p * (1.0 - EMA_ALPHA) + sample * EMA_ALPHA,
        None => sample,
    }
}

/// Heuristic expected-moves-remaining, decreasing with game length and
/// floored at 20.
fn expected_moves_remaining(moves_played: u32) -> f64 {
    (60.0 - moves_played as f64 * 0.5).max(20.0)
}

/// Build a [`SearchControl`] for the next move from a clock reading and a
/// difficulty tier.
pub fn control_for_move(
    manager: &TimeManager,
    clock: Clock,
    difficulty: AIDifficulty,
    moves_played: u32,
    stopped: Arc<AtomicBool>,
) -> SearchControl {
    let (soft, hard) = manager.compute_limits(clock, difficulty, moves_played);
    SearchControl::new_timed(stopped, soft, hard)
}
