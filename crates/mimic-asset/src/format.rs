//! Asset formats and load candidates

use std::fmt;
use std::path::Path;

use mimic_core::{MimicError, MimicResult};

/// Character model container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFormat {
    /// glTF 2.0 JSON document
    Gltf,
    /// Binary glTF container
    Glb,
    Fbx,
    /// Blender project file
    Blend,
}

impl AssetFormat {
    /// Infer from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gltf" => Some(AssetFormat::Gltf),
            "glb" => Some(AssetFormat::Glb),
            "fbx" => Some(AssetFormat::Fbx),
            "blend" => Some(AssetFormat::Blend),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssetFormat::Gltf => "gltf",
            AssetFormat::Glb => "glb",
            AssetFormat::Fbx => "fbx",
            AssetFormat::Blend => "blend",
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the ordered fallback list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Declared format; inferred from the path when absent
    pub format: Option<AssetFormat>,
    pub path: String,
}

impl Candidate {
    /// Candidate whose format comes from the path extension
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            format: None,
            path: path.into(),
        }
    }

    /// Candidate with an explicitly declared format
    pub fn with_format(format: AssetFormat, path: impl Into<String>) -> Self {
        Self {
            format: Some(format),
            path: path.into(),
        }
    }

    /// Declared or inferred format
    pub fn resolve_format(&self) -> MimicResult<AssetFormat> {
        self.format
            .or_else(|| AssetFormat::from_path(&self.path))
            .ok_or_else(|| {
                MimicError::AssetFormatUnsupported(format!("cannot infer format of {}", self.path))
            })
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            Some(format) => write!(f, "{} ({})", self.path, format),
            None => f.write_str(&self.path),
        }
    }
}

/// Record of one candidate attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub format: Option<AssetFormat>,
    pub path: String,
    /// 1 on the first pass, incremented per retry pass
    pub attempt_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_inference() {
        assert_eq!(AssetFormat::from_path("models/head.GLB"), Some(AssetFormat::Glb));
        assert_eq!(AssetFormat::from_path("a/b.gltf"), Some(AssetFormat::Gltf));
        assert_eq!(AssetFormat::from_path("scene.blend"), Some(AssetFormat::Blend));
        assert_eq!(AssetFormat::from_path("readme"), None);
    }

    #[test]
    fn test_declared_format_wins() {
        let candidate = Candidate::with_format(AssetFormat::Glb, "model.bin");
        assert_eq!(candidate.resolve_format().unwrap(), AssetFormat::Glb);
    }

    #[test]
    fn test_unknown_extension_unsupported() {
        let err = Candidate::new("model.obj").resolve_format().unwrap_err();
        assert!(matches!(err, MimicError::AssetFormatUnsupported(_)));
    }
}
