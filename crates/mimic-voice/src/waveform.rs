//! Synthetic mouth-openness waveform
//!
//! Three sinusoids at syllable, articulation and micro-detail rates give a
//! plausible talking rhythm. It is not phoneme accurate.

use std::f32::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sinusoid component: (frequency Hz, amplitude, phase offset rad)
type Partial = (f32, f32, f32);

/// Syllable rhythm
const BASE: Partial = (1.3, 0.25, 0.0);
/// Articulation
const ARTICULATION: Partial = (4.7, 0.15, 1.1);
/// Micro detail
const DETAIL: Partial = (11.0, 0.07, 2.3);

/// Center of the waveform before jitter
const OFFSET: f32 = 0.45;

/// Default jitter bound (uniform, ±)
pub const DEFAULT_JITTER: f32 = 0.08;

/// Generator for the speaking-phase activity value
#[derive(Debug, Clone)]
pub struct ActivityWaveform {
    /// Seconds since the utterance started
    t: f32,
    jitter: f32,
    rng: StdRng,
}

impl ActivityWaveform {
    /// Waveform with OS-seeded jitter
    pub fn new(jitter: f32) -> Self {
        Self::with_rng(jitter, StdRng::from_entropy())
    }

    /// Deterministic waveform for tests and replays
    pub fn seeded(jitter: f32, seed: u64) -> Self {
        Self::with_rng(jitter, StdRng::seed_from_u64(seed))
    }

    fn with_rng(jitter: f32, rng: StdRng) -> Self {
        ActivityWaveform {
            t: 0.0,
            jitter: jitter.abs(),
            rng,
        }
    }

    /// Restart the waveform at phase zero
    pub fn restart(&mut self) {
        self.t = 0.0;
    }

    /// Advance by `dt` and return the new value in [0, 1]
    pub fn sample(&mut self, dt: Duration) -> f32 {
        self.t += dt.as_secs_f32();

        let shape = OFFSET
            + partial(BASE, self.t)
            + partial(ARTICULATION, self.t)
            + partial(DETAIL, self.t);
        let noise = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };

        (shape + noise).clamp(0.0, 1.0)
    }

    /// Seconds since restart
    pub fn elapsed(&self) -> f32 {
        self.t
    }
}

fn partial((freq, amp, phase): Partial, t: f32) -> f32 {
    amp * (TAU * freq * t + phase).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_in_unit_range() {
        let mut wave = ActivityWaveform::seeded(0.5, 7);
        for _ in 0..2_000 {
            let v = wave.sample(Duration::from_millis(13));
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_seeded_waveform_is_deterministic() {
        let mut a = ActivityWaveform::seeded(DEFAULT_JITTER, 42);
        let mut b = ActivityWaveform::seeded(DEFAULT_JITTER, 42);
        for _ in 0..50 {
            let dt = Duration::from_millis(50);
            assert_eq!(a.sample(dt), b.sample(dt));
        }
    }

    #[test]
    fn test_waveform_moves() {
        let mut wave = ActivityWaveform::seeded(0.0, 1);
        let samples: Vec<f32> = (0..20)
            .map(|_| wave.sample(Duration::from_millis(50)))
            .collect();
        let min = samples.iter().cloned().fold(f32::MAX, f32::min);
        let max = samples.iter().cloned().fold(f32::MIN, f32::max);

        // A talking mouth opens and closes noticeably over a second
        assert!(max - min > 0.3, "range {min}..{max}");
    }

    #[test]
    fn test_restart() {
        let mut wave = ActivityWaveform::seeded(0.0, 1);
        let first = wave.sample(Duration::from_millis(50));
        wave.sample(Duration::from_millis(500));
        wave.restart();
        assert_eq!(wave.elapsed(), 0.0);
        assert_eq!(wave.sample(Duration::from_millis(50)), first);
    }
}
