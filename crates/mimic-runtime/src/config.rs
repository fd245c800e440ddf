//! Avatar configuration file
//!
//! JSON with every section optional; durations are integer milliseconds.
//!
//! ```json
//! {
//!   "models": [
//!     { "path": "assets/head.glb" },
//!     { "path": "assets/head_fallback.gltf", "format": "gltf" }
//!   ],
//!   "textures": [{ "slot": "head", "path": "assets/skin.png" }],
//!   "animation": { "smoothing": 0.3, "morph_weights": { "lip": 0.6 } },
//!   "blink": { "skip_probability": 0.2 },
//!   "logging": { "format": "json", "filter": "mimic=debug" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mimic_asset::{AssetFormat, AttachOptions, Candidate, LoaderConfig, TextureFormat, TextureSpec};
use mimic_core::{MimicError, MimicResult};
use mimic_scene::{MaterialPolicy, MaterialSlot, Viewport};
use mimic_voice::{ActivityConfig, SimulatedSpeechConfig};

use crate::{BlinkConfig, DriverConfig, SessionConfig, TelemetryConfig};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn as_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Whole avatar configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub viewport: ViewportSection,
    /// Model candidates, primary first
    pub models: Vec<ModelEntry>,
    pub textures: Vec<TextureEntry>,
    pub materials: MaterialPolicyName,
    pub animation: AnimationSection,
    pub speech: SpeechSection,
    pub blink: BlinkSection,
    pub loader: LoaderSection,
    pub logging: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSection {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            width: viewport.width,
            height: viewport.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureEntry {
    /// "head" or "body"
    pub slot: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialPolicyName {
    #[default]
    KeepDeclared,
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSection {
    pub rotation_scale: f32,
    pub smoothing: f32,
    /// Channel-name substring to weight multiplier
    pub morph_weights: BTreeMap<String, f32>,
    pub idle_threshold: f32,
    pub idle_delay_ms: u64,
    pub idle_smoothing: f32,
    pub max_frame_delta_ms: u64,
    /// `null` renders every frame opportunity
    pub max_fps: Option<f64>,
    pub frame_interval_us: u64,
}

impl Default for AnimationSection {
    fn default() -> Self {
        let d = DriverConfig::default();
        Self {
            rotation_scale: d.rotation_scale,
            smoothing: d.smoothing,
            morph_weights: d.morph_weights.into_iter().collect(),
            idle_threshold: d.idle_threshold,
            idle_delay_ms: as_ms(d.idle_delay),
            idle_smoothing: d.idle_smoothing,
            max_frame_delta_ms: as_ms(d.max_frame_delta),
            max_fps: d.max_fps,
            frame_interval_us: d.frame_interval.as_micros() as u64,
        }
    }
}

impl AnimationSection {
    pub fn to_driver(&self) -> DriverConfig {
        DriverConfig {
            rotation_scale: self.rotation_scale,
            smoothing: self.smoothing,
            morph_weights: self
                .morph_weights
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            idle_threshold: self.idle_threshold,
            idle_delay: ms(self.idle_delay_ms),
            idle_smoothing: self.idle_smoothing,
            max_frame_delta: ms(self.max_frame_delta_ms),
            max_fps: self.max_fps,
            frame_interval: Duration::from_micros(self.frame_interval_us),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub tick_interval_ms: u64,
    pub decay_factor: f32,
    pub epsilon: f32,
    pub jitter: f32,
    pub seed: Option<u64>,
    /// Simulated backend speaking rate
    pub words_per_minute: f32,
    pub min_duration_ms: u64,
    pub volume_interval_ms: u64,
}

impl Default for SpeechSection {
    fn default() -> Self {
        let a = ActivityConfig::default();
        let s = SimulatedSpeechConfig::default();
        Self {
            tick_interval_ms: as_ms(a.tick_interval),
            decay_factor: a.decay_factor,
            epsilon: a.epsilon,
            jitter: a.jitter,
            seed: a.seed,
            words_per_minute: s.words_per_minute,
            min_duration_ms: as_ms(s.min_duration),
            volume_interval_ms: as_ms(s.tick_interval),
        }
    }
}

impl SpeechSection {
    pub fn to_activity(&self) -> ActivityConfig {
        ActivityConfig {
            tick_interval: ms(self.tick_interval_ms),
            decay_factor: self.decay_factor,
            epsilon: self.epsilon,
            jitter: self.jitter,
            seed: self.seed,
        }
    }

    pub fn to_simulated(&self) -> SimulatedSpeechConfig {
        SimulatedSpeechConfig {
            words_per_minute: self.words_per_minute,
            min_duration: ms(self.min_duration_ms),
            tick_interval: ms(self.volume_interval_ms),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkSection {
    pub base_min_ms: u64,
    pub base_max_ms: u64,
    pub jitter_max_ms: u64,
    pub skip_probability: f64,
    pub duration_ms: u64,
    pub seed: Option<u64>,
}

impl Default for BlinkSection {
    fn default() -> Self {
        let b = BlinkConfig::default();
        Self {
            base_min_ms: as_ms(b.base_min),
            base_max_ms: as_ms(b.base_max),
            jitter_max_ms: as_ms(b.jitter_max),
            skip_probability: b.skip_probability,
            duration_ms: as_ms(b.duration),
            seed: b.seed,
        }
    }
}

impl BlinkSection {
    pub fn to_blink(&self) -> BlinkConfig {
        BlinkConfig {
            base_min: ms(self.base_min_ms),
            base_max: ms(self.base_max_ms),
            jitter_max: ms(self.jitter_max_ms),
            skip_probability: self.skip_probability,
            duration: ms(self.duration_ms),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for LoaderSection {
    fn default() -> Self {
        let l = LoaderConfig::default();
        Self {
            max_retries: l.max_retries,
            retry_backoff_ms: as_ms(l.retry_backoff),
            attempt_timeout_ms: as_ms(l.attempt_timeout),
        }
    }
}

impl LoaderSection {
    pub fn to_loader(&self) -> LoaderConfig {
        LoaderConfig {
            max_retries: self.max_retries,
            retry_backoff: ms(self.retry_backoff_ms),
            attempt_timeout: ms(self.attempt_timeout_ms),
        }
    }
}

impl AvatarConfig {
    /// Parse and validate
    pub fn from_json_str(json: &str) -> MimicResult<Self> {
        let config: AvatarConfig = serde_json::from_str(json)
            .map_err(|e| MimicError::InvalidConfig(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> MimicResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), models = config.models.len(), "config loaded");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> MimicResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MimicError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> MimicResult<()> {
        self.candidates()?;
        self.session_config()?.validate()
    }

    /// Model candidates in declared order
    pub fn candidates(&self) -> MimicResult<Vec<Candidate>> {
        self.models
            .iter()
            .map(|entry| match &entry.format {
                None => Ok(Candidate::new(entry.path.clone())),
                Some(name) => AssetFormat::from_extension(name)
                    .map(|format| Candidate::with_format(format, entry.path.clone()))
                    .ok_or_else(|| {
                        MimicError::InvalidConfig(format!(
                            "unknown model format '{name}' for {}",
                            entry.path
                        ))
                    }),
            })
            .collect()
    }

    pub fn texture_specs(&self) -> MimicResult<Vec<TextureSpec>> {
        self.textures
            .iter()
            .map(|entry| {
                let slot = match entry.slot.to_ascii_lowercase().as_str() {
                    "head" => MaterialSlot::Head,
                    "body" => MaterialSlot::Body,
                    other => {
                        return Err(MimicError::InvalidConfig(format!(
                            "unknown texture slot '{other}'"
                        )))
                    }
                };
                let format = match entry.format.as_deref() {
                    None => None,
                    Some(name) => Some(texture_format(name).ok_or_else(|| {
                        MimicError::InvalidConfig(format!("unknown texture format '{name}'"))
                    })?),
                };
                Ok(TextureSpec {
                    format,
                    ..TextureSpec::new(slot, entry.path.clone())
                })
            })
            .collect()
    }

    /// Component configuration for `AvatarSession::start`
    pub fn session_config(&self) -> MimicResult<SessionConfig> {
        let policy = match self.materials {
            MaterialPolicyName::KeepDeclared => MaterialPolicy::KeepDeclared,
            MaterialPolicyName::Override => MaterialPolicy::Override,
        };
        Ok(SessionConfig {
            viewport: Viewport::new(self.viewport.width, self.viewport.height),
            driver: self.animation.to_driver(),
            blink: self.blink.to_blink(),
            activity: self.speech.to_activity(),
            loader: self.loader.to_loader(),
            attach: AttachOptions {
                policy,
                ..Default::default()
            },
            textures: self.texture_specs()?,
        })
    }
}

fn texture_format(name: &str) -> Option<TextureFormat> {
    match name.to_ascii_lowercase().as_str() {
        "tga" => Some(TextureFormat::Tga),
        "png" => Some(TextureFormat::Png),
        "jpg" | "jpeg" => Some(TextureFormat::Jpeg),
        _ => None,
    }
}
