//! Format loaders keyed by `AssetFormat`

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use mimic_core::{MimicError, MimicResult};
use mimic_scene::{AnimationClip, Scene};

use crate::{glb, gltf, AssetFormat};

/// A parsed model, not yet attached to any scene
#[derive(Debug, Clone)]
pub struct ModelData {
    /// Model hierarchy; the root is a group named after the asset
    pub scene: Scene,
    /// Clips addressing nodes of `scene`
    pub clips: Vec<AnimationClip>,
}

/// Turns fetched bytes of one format into a model
pub trait FormatLoader: Send + Sync {
    fn format(&self) -> AssetFormat;

    fn parse(&self, path: &str, data: &Bytes) -> MimicResult<ModelData>;
}

/// glTF JSON documents
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfLoader;

impl FormatLoader for GltfLoader {
    fn format(&self) -> AssetFormat {
        AssetFormat::Gltf
    }

    fn parse(&self, path: &str, data: &Bytes) -> MimicResult<ModelData> {
        gltf::build_model(path, data, None)
    }
}

/// Binary glTF containers
#[derive(Debug, Default, Clone, Copy)]
pub struct GlbLoader;

impl FormatLoader for GlbLoader {
    fn format(&self) -> AssetFormat {
        AssetFormat::Glb
    }

    fn parse(&self, path: &str, data: &Bytes) -> MimicResult<ModelData> {
        let chunks = glb::split(path, data)?;
        gltf::build_model(path, &chunks.json, chunks.bin.as_deref())
    }
}

/// Registered loaders
#[derive(Clone)]
pub struct FormatRegistry {
    loaders: HashMap<AssetFormat, Arc<dyn FormatLoader>>,
}

impl FormatRegistry {
    /// Registry without any loader
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Replace the loader for its format
    pub fn register(&mut self, loader: Arc<dyn FormatLoader>) {
        self.loaders.insert(loader.format(), loader);
    }

    pub fn supports(&self, format: AssetFormat) -> bool {
        self.loaders.contains_key(&format)
    }

    pub fn get(&self, format: AssetFormat) -> MimicResult<&Arc<dyn FormatLoader>> {
        self.loaders.get(&format).ok_or_else(|| {
            MimicError::AssetFormatUnsupported(format!("no loader registered for {format}"))
        })
    }
}

impl Default for FormatRegistry {
    /// glTF and GLB; FBX and Blender files are unsupported
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(GltfLoader));
        registry.register(Arc::new(GlbLoader));
        registry
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.loaders.keys().map(|k| k.name()).collect();
        formats.sort_unstable();
        f.debug_struct("FormatRegistry").field("formats", &formats).finish()
    }
}
