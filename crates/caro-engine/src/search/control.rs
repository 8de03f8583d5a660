//! Search control — stop flag and time management.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Controls when a search should stop.
///
/// Checked periodically by the search (every 2048 nodes) to decide whether
/// to abort. Two modes: **infinite** (no time pressure, only the external
/// stop flag matters) and **timed** (soft/hard deadlines from the clock, per
/// the time manager).
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    clock_active: bool,
    start: Mutex<Option<Instant>>,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
    /// Scaling factor applied to the soft limit by the stability tracker,
    /// in hundredths (100 = neutral).
    soft_scale: AtomicI32,
}

impl SearchControl {
    /// Control with no time limits, stopping only on the external flag.
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> Self {
        Self {
            stopped,
            clock_active: false,
            start: Mutex::new(None),
            soft_limit: None,
            hard_limit: None,
            soft_scale: AtomicI32::new(100),
        }
    }

    /// Control with soft/hard deadlines; the clock starts immediately.
    pub fn new_timed(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> Self {
        Self {
            stopped,
            clock_active: true,
            start: Mutex::new(Some(Instant::now())),
            soft_limit: Some(soft),
            hard_limit: Some(hard),
            soft_scale: AtomicI32::new(100),
        }
    }

    /// Check whether the search should abort immediately: the external stop
    /// flag was set, or the clock is active and the hard limit has passed
    /// (checked only every 2048 nodes).
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        if nodes & 2047 != 0 {
            return false;
        }
        if !self.clock_active {
            return false;
        }
        if let Some(hard) = self.hard_limit {
            if self.elapsed() >= hard {
                self.stopped.store(true, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Update the soft-limit scaling factor (hundredths), set by the
    /// stability tracker after each completed iteration.
    pub fn update_soft_scale(&self, scale_hundredths: i32) {
        self.soft_scale.store(scale_hundredths, Ordering::Relaxed);
    }

    /// Whether iterative deepening should stop rather than start another
    /// iteration: `effective = soft * soft_scale / 100`, clamped to the hard
    /// limit so stability scaling can never exceed the hard budget.
    pub fn should_stop_iterating(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        if !self.clock_active {
            return false;
        }
        if let Some(soft) = self.soft_limit {
            let scale = self.soft_scale.load(Ordering::Relaxed);
            let effective_ms = (soft.as_millis() as i64 * scale as i64 / 100) as u64;
            let mut effective = Duration::from_millis(effective_ms);
            if let Some(hard) = self.hard_limit {
                effective = effective.min(hard);
            }
            return self.elapsed() >= effective;
        }
        false
    }

    /// The soft deadline this control was built with, if timed.
    pub fn soft_limit(&self) -> Option<Duration> {
        self.soft_limit
    }

    /// Elapsed time since construction, or `Duration::ZERO` if untimed.
    pub fn elapsed(&self) -> Duration {
        self.start
            .lock()
            .expect("start mutex poisoned")
            .map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Reference to the shared stop flag.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_scale_60_does_not_fire_immediately() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(stopped, Duration::from_secs(10), Duration::from_secs(30));
        control.update_soft_scale(60);
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn soft_scale_does_not_affect_hard() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(stopped, Duration::from_secs(10), Duration::from_secs(30));
        control.update_soft_scale(1);
        assert!(!control.should_stop(2048));
    }

    #[test]
    fn soft_scale_clamped_by_hard_limit() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(stopped, Duration::from_secs(10), Duration::from_secs(5));
        control.update_soft_scale(250);
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn infinite_control_never_times_out() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_infinite(stopped);
        assert!(!control.should_stop(4096));
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn external_stop_flag_halts_immediately() {
        let stopped = Arc::new(AtomicBool::new(true));
        let control = SearchControl::new_timed(stopped, Duration::from_secs(10), Duration::from_secs(30));
        assert!(control.should_stop(1));
        assert!(control.should_stop_iterating());
    }
}
