//! MIMIC Test Harness - fault injection and deterministic simulation
//!
//! This crate provides:
//! - Asset sources that fail, stall or corrupt on cue
//! - Randomly unreliable sources with reproducible seeds
//! - glTF/GLB character fixtures built in memory
//! - A single-threaded frame simulator on a manual clock
//! - End-to-end session scenarios (under `tests/`)

pub mod chaos;
pub mod fixtures;
pub mod simulator;

pub use chaos::*;
pub use fixtures::*;
pub use simulator::*;
