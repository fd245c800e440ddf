//! Speech activity source
//!
//! The only writer of the `SpeechActivity` signal. Lifecycle:
//!
//! ```text
//!   Idle --start--> Speaking --stop/fail--> Decaying --value < epsilon--> Idle
//! ```
//!
//! Decay is geometric, so the mouth always closes smoothly, even on error.

use std::time::Duration;

use mimic_core::{ActivityWriter, MimicError, MimicResult, SpeechActivity};

use crate::{ActivityWaveform, SpeechEvent, DEFAULT_JITTER};

/// Activity source configuration
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    /// Fixed tick period while speaking or decaying
    pub tick_interval: Duration,
    /// Per-tick multiplier while decaying, in (0, 1)
    pub decay_factor: f32,
    /// Values below this snap to exactly zero
    pub epsilon: f32,
    /// Uniform jitter bound added to the waveform
    pub jitter: f32,
    /// Fixed RNG seed (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            decay_factor: 0.78,
            epsilon: 0.01,
            jitter: DEFAULT_JITTER,
            seed: None,
        }
    }
}

impl ActivityConfig {
    pub const MIN_TICK: Duration = Duration::from_millis(30);
    pub const MAX_TICK: Duration = Duration::from_millis(100);

    pub fn validate(&self) -> MimicResult<()> {
        if self.tick_interval < Self::MIN_TICK || self.tick_interval > Self::MAX_TICK {
            return Err(MimicError::InvalidConfig(format!(
                "activity tick_interval {:?} outside {:?}..={:?}",
                self.tick_interval,
                Self::MIN_TICK,
                Self::MAX_TICK
            )));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(MimicError::InvalidConfig(format!(
                "activity decay_factor {} must be in (0, 1)",
                self.decay_factor
            )));
        }
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(MimicError::InvalidConfig(format!(
                "activity epsilon {} must be in (0, 1)",
                self.epsilon
            )));
        }
        if !(0.0..=0.5).contains(&self.jitter) {
            return Err(MimicError::InvalidConfig(format!(
                "activity jitter {} must be in [0, 0.5]",
                self.jitter
            )));
        }
        Ok(())
    }
}

/// Source lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Idle,
    Speaking,
    Decaying,
}

/// Speech activity source
#[derive(Debug)]
pub struct SpeechActivitySource {
    config: ActivityConfig,
    writer: ActivityWriter,
    waveform: ActivityWaveform,
    phase: SourcePhase,
    value: f32,
    /// Backend loudness hint applied to the waveform
    volume: f32,
    /// Utterance length announced at start
    duration_hint: Option<Duration>,
    /// Time spent in `Speaking` for the current utterance
    spoken: Duration,
    backend_available: bool,
}

impl SpeechActivitySource {
    pub fn new(config: ActivityConfig, writer: ActivityWriter) -> Self {
        let waveform = match config.seed {
            Some(seed) => ActivityWaveform::seeded(config.jitter, seed),
            None => ActivityWaveform::new(config.jitter),
        };
        let source = Self {
            config,
            writer,
            waveform,
            phase: SourcePhase::Idle,
            value: 0.0,
            volume: 1.0,
            duration_hint: None,
            spoken: Duration::ZERO,
            backend_available: true,
        };
        source.publish();
        source
    }

    /// Record whether the speech backend can currently speak
    pub fn set_backend_available(&mut self, available: bool) {
        self.backend_available = available;
    }

    /// Begin an utterance: value resets to 0 and the source becomes active.
    ///
    /// Returns `false` without changing state when the backend is unavailable.
    pub fn start(&mut self, duration_hint: Option<Duration>) -> bool {
        if !self.backend_available {
            tracing::warn!("speech backend unavailable, activity source stays idle");
            return false;
        }

        self.phase = SourcePhase::Speaking;
        self.value = 0.0;
        self.volume = 1.0;
        self.duration_hint = duration_hint;
        self.spoken = Duration::ZERO;
        self.waveform.restart();
        self.publish();
        tracing::debug!(?duration_hint, "activity source started");
        true
    }

    /// Advance one tick and return the published value
    pub fn tick(&mut self, dt: Duration) -> f32 {
        match self.phase {
            SourcePhase::Idle => {}
            SourcePhase::Speaking => {
                self.spoken += dt;
                self.value = (self.waveform.sample(dt) * self.volume).clamp(0.0, 1.0);
                if self.duration_hint.is_some_and(|hint| self.spoken >= hint) {
                    // Backend never reported the end; close anyway
                    tracing::debug!(spoken = ?self.spoken, "duration hint reached");
                    self.phase = SourcePhase::Decaying;
                }
            }
            SourcePhase::Decaying => {
                self.value *= self.config.decay_factor;
                if self.value < self.config.epsilon {
                    self.value = 0.0;
                    self.phase = SourcePhase::Idle;
                    tracing::debug!("activity decayed to rest");
                }
            }
        }
        self.publish();
        self.value
    }

    /// End of utterance: begin decaying toward zero
    pub fn stop(&mut self) {
        if self.phase == SourcePhase::Speaking {
            self.phase = SourcePhase::Decaying;
            tracing::debug!(value = self.value, "activity decaying");
        }
    }

    /// Synthesis error: same smooth close as `stop`
    pub fn fail(&mut self, reason: &str) {
        tracing::warn!(reason, "speech synthesis failed");
        self.stop();
    }

    /// Map a backend lifecycle event onto the source
    pub fn on_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started { duration_hint } => {
                if self.phase != SourcePhase::Speaking {
                    self.start(duration_hint);
                } else if duration_hint.is_some() {
                    self.duration_hint = duration_hint;
                }
            }
            SpeechEvent::Tick { volume_hint } => {
                self.volume = if volume_hint.is_finite() {
                    volume_hint.clamp(0.0, 1.0)
                } else {
                    1.0
                };
            }
            SpeechEvent::Ended => self.stop(),
            SpeechEvent::Failed(reason) => self.fail(&reason),
        }
    }

    /// Decay ticks needed to bring a fully open mouth to rest
    pub fn max_decay_ticks(&self) -> u32 {
        let mut value = 1.0f32;
        let mut ticks = 0;
        while value >= self.config.epsilon {
            value *= self.config.decay_factor;
            ticks += 1;
        }
        ticks
    }

    /// True from start until the closing decay completes
    pub fn is_speaking(&self) -> bool {
        self.phase != SourcePhase::Idle
    }

    pub fn phase(&self) -> SourcePhase {
        self.phase
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    fn publish(&self) {
        self.writer
            .publish(SpeechActivity::new(self.value, self.is_speaking()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::activity_channel;
    use proptest::prelude::*;

    const TICK: Duration = Duration::from_millis(50);

    fn source(seed: u64) -> (SpeechActivitySource, mimic_core::ActivityReader) {
        let (writer, reader) = activity_channel();
        let config = ActivityConfig {
            seed: Some(seed),
            ..Default::default()
        };
        (SpeechActivitySource::new(config, writer), reader)
    }

    #[test]
    fn test_default_config_valid() {
        assert!(ActivityConfig::default().validate().is_ok());

        let slow = ActivityConfig {
            tick_interval: Duration::from_millis(250),
            ..Default::default()
        };
        assert!(slow.validate().is_err());

        let no_decay = ActivityConfig {
            decay_factor: 1.0,
            ..Default::default()
        };
        assert!(no_decay.validate().is_err());
    }

    #[test]
    fn test_start_resets_and_activates() {
        let (mut src, reader) = source(1);
        assert!(!reader.snapshot().active);

        assert!(src.start(None));
        let snap = reader.snapshot();
        assert!(snap.active);
        assert_eq!(snap.value, 0.0);
        assert!(src.is_speaking());
    }

    #[test]
    fn test_start_without_backend_is_noop() {
        let (mut src, reader) = source(1);
        src.set_backend_available(false);

        assert!(!src.start(Some(Duration::from_secs(1))));
        assert!(!src.is_speaking());
        assert_eq!(reader.snapshot(), SpeechActivity::SILENT);
    }

    #[test]
    fn test_speaking_values_in_range() {
        let (mut src, reader) = source(3);
        src.start(None);
        for _ in 0..200 {
            let v = src.tick(TICK);
            assert!((0.0..=1.0).contains(&v));
            assert_eq!(reader.snapshot().value, v);
        }
    }

    #[test]
    fn test_stop_decays_to_exact_zero() {
        let (mut src, reader) = source(5);
        src.start(None);
        for _ in 0..10 {
            src.tick(TICK);
        }
        src.stop();
        assert_eq!(src.phase(), SourcePhase::Decaying);

        let bound = src.max_decay_ticks();
        let mut ticks = 0;
        while src.is_speaking() {
            src.tick(TICK);
            ticks += 1;
            assert!(ticks <= bound);
        }

        assert_eq!(src.value(), 0.0);
        assert_eq!(reader.snapshot(), SpeechActivity::SILENT);
    }

    #[test]
    fn test_max_decay_ticks_default() {
        let (src, _) = source(0);
        // 0.78^19 < 0.01 <= 0.78^18
        assert_eq!(src.max_decay_ticks(), 19);
    }

    #[test]
    fn test_duration_hint_closes_mouth() {
        let (mut src, _) = source(9);
        src.start(Some(Duration::from_millis(200)));
        for _ in 0..4 {
            src.tick(TICK);
        }
        assert_eq!(src.phase(), SourcePhase::Decaying);
    }

    #[test]
    fn test_events_drive_lifecycle() {
        let (mut src, _) = source(11);
        src.on_event(SpeechEvent::Started {
            duration_hint: None,
        });
        assert_eq!(src.phase(), SourcePhase::Speaking);

        src.on_event(SpeechEvent::Tick { volume_hint: 0.0 });
        assert_eq!(src.tick(TICK), 0.0);

        src.on_event(SpeechEvent::Failed("voice crashed".into()));
        assert_eq!(src.phase(), SourcePhase::Decaying);

        src.on_event(SpeechEvent::Ended);
        assert_eq!(src.phase(), SourcePhase::Decaying);
    }

    proptest! {
        #[test]
        fn test_decay_strictly_monotonic(
            seed in any::<u64>(),
            speaking_ticks in 1usize..60,
            decay in 0.05f32..0.95,
        ) {
            let (writer, _reader) = activity_channel();
            let config = ActivityConfig {
                decay_factor: decay,
                seed: Some(seed),
                ..Default::default()
            };
            let mut src = SpeechActivitySource::new(config, writer);
            src.start(None);
            for _ in 0..speaking_ticks {
                src.tick(TICK);
            }
            src.stop();

            let bound = src.max_decay_ticks();
            let mut prev = src.value();
            let mut ticks = 0;
            while src.is_speaking() {
                let next = src.tick(TICK);
                ticks += 1;
                prop_assert!(next < prev || (prev == 0.0 && next == 0.0));
                prop_assert!(ticks <= bound);
                prev = next;
            }
            prop_assert_eq!(src.value(), 0.0);
        }
    }
}
