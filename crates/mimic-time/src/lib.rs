//! MIMIC Time - clocks and scheduling for the animation loop
//!
//! This crate implements the temporal plumbing of the avatar runtime:
//! - Clock sources (monotonic wall clock, manual clock for simulation)
//! - Frame clock: real elapsed time between executed ticks
//! - Frame limiter: caps how often a tick actually does work
//! - Cancellable timers for the frame loop, speech ticks and blinks

pub mod clock;
pub mod limiter;
pub mod timer;

pub use clock::*;
pub use limiter::*;
pub use timer::*;
