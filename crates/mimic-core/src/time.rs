//! Time primitives for MIMIC
//!
//! Every animation decision is taken against `MediaTime`: a monotonic
//! microsecond counter since session start. Wall-clock sources live in
//! `mimic-time`; this type only carries the value.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Media time - monotonic, local-driven
/// Represented as microseconds since session start
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaTime(pub u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        MediaTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        MediaTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        MediaTime((secs.max(0.0) * 1_000_000.0) as u64)
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn as_secs_f32(self) -> f32 {
        self.as_secs_f64() as f32
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        MediaTime(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Elapsed time since an earlier instant (zero if `earlier` is later)
    #[inline]
    pub fn since(self, earlier: MediaTime) -> Duration {
        self - earlier
    }
}

impl Add<Duration> for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<MediaTime> for MediaTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: MediaTime) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Debug for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1000.0)
    }
}
