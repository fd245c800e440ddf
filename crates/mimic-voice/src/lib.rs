//! MIMIC Voice - the speech side of lip-sync
//!
//! There is no audio analysis here. While the backend speaks, a synthetic
//! waveform stands in for loudness and drives the mouth; when it stops, the
//! value decays geometrically to a closed mouth.
//!
//! - `ActivityWaveform`: superimposed sinusoids plus bounded jitter
//! - `SpeechActivitySource`: single writer of the activity signal
//! - `SpeechBackend`: speech engine abstraction with lifecycle events

pub mod backend;
pub mod source;
pub mod waveform;

pub use backend::*;
pub use source::*;
pub use waveform::*;
