//! MIMIC Scene - what the renderer draws
//!
//! The scene is a generational arena of nodes with parent/child indices.
//! Node kinds are a closed enum; traversal is an explicit-stack visitor.
//!
//! - `graph`: the arena, grafting and detaching subtrees
//! - `pose`: vectors, quaternions and local transforms
//! - `material`: colours, Phong materials and the head/body material set
//! - `camera`, `lighting`: viewport-driven camera and the default light rig
//! - `clip`: keyframed clips and the mixer that plays them
//! - `introspect`: discovery of the nodes the lip-sync driver animates

pub mod camera;
pub mod clip;
pub mod graph;
pub mod introspect;
pub mod lighting;
pub mod material;
pub mod pose;

pub use camera::*;
pub use clip::*;
pub use graph::*;
pub use introspect::*;
pub use lighting::*;
pub use material::*;
pub use pose::*;
