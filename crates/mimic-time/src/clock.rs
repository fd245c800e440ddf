//! Clock implementations for the MIMIC animation loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use mimic_core::MediaTime;

/// Largest frame delta handed to animation by default (e.g. after system sleep)
pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

/// A source of media time
pub trait Clock: Send + Sync {
    /// Current media time; MUST never go backwards
    fn now(&self) -> MediaTime;
}

/// Wall clock backed by the monotonic OS clock
///
/// Reads tokio's `Instant`, so a runtime with paused time drives it too.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    reference: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is "now"
    pub fn new() -> Self {
        MonotonicClock {
            reference: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> MediaTime {
        MediaTime::from_micros(self.reference.elapsed().as_micros() as u64)
    }
}

/// Manually advanced clock for deterministic simulation
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, dt: Duration) -> MediaTime {
        let added = dt.as_micros() as u64;
        let prev = self.micros.fetch_add(added, Ordering::SeqCst);
        MediaTime::from_micros(prev.saturating_add(added))
    }

    /// Jump to an absolute time; only allowed to move forward
    pub fn set(&self, t: MediaTime) {
        self.micros.fetch_max(t.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> MediaTime {
        MediaTime::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// Frame clock - real elapsed time between executed ticks
///
/// The first tick after construction or `reset` yields a zero delta, so a
/// freshly attached mixer never jumps.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<MediaTime>,
    max_delta: Duration,
}

impl FrameClock {
    pub fn new(max_delta: Duration) -> Self {
        FrameClock {
            last: None,
            max_delta,
        }
    }

    /// Elapsed time since the previous call, clamped to `max_delta`
    pub fn delta(&mut self, now: MediaTime) -> Duration {
        let elapsed = match self.last {
            Some(last) => now - last,
            None => Duration::ZERO,
        };
        if self.last.map_or(true, |last| now > last) {
            self.last = Some(now);
        }
        elapsed.min(self.max_delta)
    }

    /// Time of the last executed tick
    pub fn last(&self) -> Option<MediaTime> {
        self.last
    }

    /// Forget the previous tick
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DELTA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();

        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_millis(16));
        assert_eq!(other.now(), MediaTime::from_millis(16));

        // Never backwards
        other.set(MediaTime::from_millis(5));
        assert_eq!(clock.now(), MediaTime::from_millis(16));
    }

    #[test]
    fn test_frame_clock_first_delta_is_zero() {
        let mut frames = FrameClock::default();

        assert_eq!(frames.delta(MediaTime::from_millis(500)), Duration::ZERO);
        assert_eq!(
            frames.delta(MediaTime::from_millis(516)),
            Duration::from_millis(16)
        );
    }

    #[test]
    fn test_frame_clock_clamps_large_jumps() {
        let mut frames = FrameClock::new(Duration::from_millis(100));

        frames.delta(MediaTime::ZERO);
        let dt = frames.delta(MediaTime::from_millis(5_000));

        assert_eq!(dt, Duration::from_millis(100));
    }

    #[test]
    fn test_frame_clock_reset() {
        let mut frames = FrameClock::default();
        frames.delta(MediaTime::from_millis(10));
        frames.reset();

        assert!(frames.last().is_none());
        assert_eq!(frames.delta(MediaTime::from_millis(40)), Duration::ZERO);
    }
}
