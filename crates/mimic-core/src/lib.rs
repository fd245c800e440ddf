//! MIMIC Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every MIMIC layer:
//! - Identifiers (NodeId, AssetId, UtteranceId)
//! - Media time (monotonic frame time)
//! - Speech activity (the scalar that drives the mouth)
//! - The error taxonomy

pub mod activity;
pub mod error;
pub mod id;
pub mod time;

pub use activity::*;
pub use error::*;
pub use id::*;
pub use time::*;
