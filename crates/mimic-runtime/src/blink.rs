//! Eye blinks at randomized intervals
//!
//! ```text
//! open --(next_at reached)--> roll skip? --yes--> open (reschedule)
//!                                       \--no---> closed --(duration)--> open
//! ```

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mimic_core::{MediaTime, MimicError, MimicResult, NodeId};
use mimic_scene::{BlinkTarget, Scene};

/// Blink timing
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkConfig {
    /// Base interval is drawn uniformly from `base_min..=base_max`
    pub base_min: Duration,
    pub base_max: Duration,
    /// Extra delay drawn uniformly from `0..=jitter_max`
    pub jitter_max: Duration,
    /// Chance that a due blink is skipped
    pub skip_probability: f64,
    /// How long the eyes stay closed
    pub duration: Duration,
    pub seed: Option<u64>,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            base_min: Duration::from_secs(3),
            base_max: Duration::from_secs(5),
            jitter_max: Duration::from_secs(2),
            skip_probability: 0.2,
            duration: Duration::from_millis(150),
            seed: None,
        }
    }
}

impl BlinkConfig {
    pub fn validate(&self) -> MimicResult<()> {
        if self.base_min.is_zero() || self.base_min > self.base_max {
            return Err(MimicError::InvalidConfig(format!(
                "blink interval {:?}..{:?} is empty",
                self.base_min, self.base_max
            )));
        }
        if !(0.0..=1.0).contains(&self.skip_probability) {
            return Err(MimicError::InvalidConfig(format!(
                "blink skip_probability {} outside [0, 1]",
                self.skip_probability
            )));
        }
        if self.duration.is_zero() || self.duration >= self.base_min {
            return Err(MimicError::InvalidConfig(
                "blink duration must be positive and shorter than the interval".into(),
            ));
        }
        Ok(())
    }
}

/// Whether the eyes are closed right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlinkState {
    pub is_blinking: bool,
    /// When the current blink ends
    pub until: Option<MediaTime>,
}

/// What an `update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkEvent {
    Closed,
    Opened,
    Skipped,
}

/// Schedules blinks and applies them to the current blink targets
#[derive(Debug)]
pub struct BlinkScheduler {
    config: BlinkConfig,
    rng: StdRng,
    targets: Vec<BlinkTarget>,
    state: BlinkState,
    next_at: Option<MediaTime>,
    blinks: u64,
    skipped: u64,
}

impl BlinkScheduler {
    pub fn new(config: BlinkConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            targets: Vec::new(),
            state: BlinkState::default(),
            next_at: None,
            blinks: 0,
            skipped: 0,
        }
    }

    /// Replace the targets (asset swap). The old targets are not written.
    pub fn set_targets(&mut self, targets: Vec<BlinkTarget>) {
        self.targets = targets;
        self.state = BlinkState::default();
    }

    pub fn targets(&self) -> &[BlinkTarget] {
        &self.targets
    }

    pub fn state(&self) -> BlinkState {
        self.state
    }

    /// Is this morph channel held closed by a blink in progress?
    pub fn owns(&self, node: NodeId, channel: usize) -> bool {
        self.state.is_blinking
            && self
                .targets
                .contains(&BlinkTarget::Morph { node, channel })
    }

    /// Draw the delay until the next blink
    pub fn next_interval(&mut self) -> Duration {
        let base = self
            .rng
            .gen_range(self.config.base_min.as_secs_f64()..=self.config.base_max.as_secs_f64());
        let jitter = self
            .rng
            .gen_range(0.0..=self.config.jitter_max.as_secs_f64());
        Duration::from_secs_f64(base + jitter)
    }

    /// When `update` next has something to do
    pub fn next_deadline(&self) -> Option<MediaTime> {
        if self.state.is_blinking {
            self.state.until
        } else {
            self.next_at
        }
    }

    /// Advance the schedule to `now`
    pub fn update(&mut self, now: MediaTime, scene: &mut Scene) -> Option<BlinkEvent> {
        if self.state.is_blinking {
            if self.state.until.is_some_and(|until| now < until) {
                return None;
            }
            self.apply(scene, false);
            self.state = BlinkState::default();
            self.schedule(now);
            return Some(BlinkEvent::Opened);
        }

        match self.next_at {
            None => {
                self.schedule(now);
                None
            }
            Some(at) if now >= at => {
                if self.rng.gen::<f64>() < self.config.skip_probability {
                    self.skipped += 1;
                    self.schedule(now);
                    tracing::trace!("blink skipped");
                    return Some(BlinkEvent::Skipped);
                }
                self.apply(scene, true);
                self.state = BlinkState {
                    is_blinking: true,
                    until: Some(now + self.config.duration),
                };
                self.blinks += 1;
                Some(BlinkEvent::Closed)
            }
            Some(_) => None,
        }
    }

    /// Open the eyes and forget the schedule
    pub fn reset(&mut self, scene: &mut Scene) {
        if self.state.is_blinking {
            self.apply(scene, false);
        }
        self.state = BlinkState::default();
        self.next_at = None;
    }

    pub fn blinks(&self) -> u64 {
        self.blinks
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn schedule(&mut self, now: MediaTime) {
        let interval = self.next_interval();
        self.next_at = Some(now + interval);
    }

    fn apply(&self, scene: &mut Scene, closed: bool) {
        for target in &self.targets {
            match *target {
                BlinkTarget::Morph { node, channel } => {
                    scene.set_morph_weight(node, channel, if closed { 1.0 } else { 0.0 });
                }
                BlinkTarget::Eyelid { node } => {
                    if let Some(eyelid) = scene.get_mut(node) {
                        eyelid.visible = closed;
                    }
                }
            }
        }
    }
}
