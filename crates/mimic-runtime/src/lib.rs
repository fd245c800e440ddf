//! MIMIC Runtime - the avatar session
//!
//! An `AvatarSession` owns the scene, the current asset and three loops:
//!
//! ```text
//! frame loop   (every frame opportunity) -> AnimationDriver::frame -> RenderTarget
//! speech task  (per utterance)           -> SpeechActivitySource::tick
//! blink timer  (randomized interval)     -> BlinkScheduler::update
//! ```
//!
//! The speech task publishes activity; the frame loop reads it once per
//! executed frame. Every loop is a `TimerHandle` and is cancelled before the
//! resources it touches are released.

pub mod blink;
pub mod config;
pub mod driver;
pub mod facade;
pub mod render;
pub mod session;
pub mod speech;
pub mod telemetry;

pub use blink::*;
pub use config::*;
pub use driver::*;
pub use facade::*;
pub use render::*;
pub use session::*;
pub use speech::*;
pub use telemetry::*;
