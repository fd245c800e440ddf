//! MIMIC Asset - getting a character model into the scene
//!
//! Loading walks an ordered list of candidates (primary first, then declared
//! fallbacks). A candidate that cannot be fetched, cannot be parsed, or takes
//! too long is skipped; the whole list is retried a bounded number of times
//! before the load is reported as fatal.
//!
//! - `source`: where bytes come from (filesystem, memory)
//! - `format`, `registry`: per-format loaders (glTF JSON, GLB)
//! - `loader`: the fallback/retry chain
//! - `handle`: attaching a loaded model to the scene and releasing it
//! - `texture`: head/body textures with default-colour fallback

pub mod format;
pub mod glb;
pub mod gltf;
pub mod handle;
pub mod loader;
pub mod progress;
pub mod registry;
pub mod source;
pub mod texture;

pub use format::*;
pub use handle::*;
pub use loader::*;
pub use progress::*;
pub use registry::*;
pub use source::*;
pub use texture::*;
