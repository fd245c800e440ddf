//! Frame limiter - decouples "how often we are woken" from "how often we work"

use std::time::Duration;

use mimic_core::MediaTime;

/// Tolerance for wake-up jitter when comparing against the minimum interval
const WAKE_SLACK: Duration = Duration::from_millis(1);

/// Caps the rate at which a frame body runs
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    /// Minimum time between executed frames (None = uncapped)
    min_interval: Option<Duration>,
    /// Last executed frame
    last_run: Option<MediaTime>,
    executed: u64,
    skipped: u64,
}

impl FrameLimiter {
    /// Limiter targeting `max_hz` executed frames per second
    pub fn new(max_hz: Option<f64>) -> Self {
        let min_interval = max_hz
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .map(|hz| Duration::from_secs_f64(1.0 / hz));
        FrameLimiter {
            min_interval,
            last_run: None,
            executed: 0,
            skipped: 0,
        }
    }

    /// No cap: every opportunity executes
    pub fn uncapped() -> Self {
        Self::new(None)
    }

    /// Decide whether the frame body should run at `now`
    pub fn ready(&mut self, now: MediaTime) -> bool {
        let run = match (self.min_interval, self.last_run) {
            (Some(min), Some(last)) => now - last + WAKE_SLACK >= min,
            _ => true,
        };

        if run {
            self.last_run = Some(now);
            self.executed += 1;
        } else {
            self.skipped += 1;
        }
        run
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Number of executed frames
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Number of skipped opportunities
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Forget the last executed frame
    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self::new(Some(60.0))
    }
}
