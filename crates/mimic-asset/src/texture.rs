//! Head/body textures
//!
//! Each texture loads independently. One that cannot be fetched or does not
//! look like an image of its declared format leaves its slot on the default
//! colour material.

use std::path::Path;

use mimic_core::{MimicError, MimicResult};
use mimic_scene::{Color, MaterialSet, MaterialSlot, Texture};

use crate::{AssetSource, ProgressReporter};

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Tga,
    Png,
    Jpeg,
}

impl TextureFormat {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tga" => Some(TextureFormat::Tga),
            "png" => Some(TextureFormat::Png),
            "jpg" | "jpeg" => Some(TextureFormat::Jpeg),
            _ => None,
        }
    }
}

/// One texture to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSpec {
    pub slot: MaterialSlot,
    pub path: String,
    /// Declared format; inferred from the extension when absent
    pub format: Option<TextureFormat>,
}

impl TextureSpec {
    pub fn new(slot: MaterialSlot, path: impl Into<String>) -> Self {
        Self {
            slot,
            path: path.into(),
            format: None,
        }
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> MimicError {
    MimicError::AssetParseFailure {
        path: path.to_string(),
        reason: reason.into(),
    }
}

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const TGA_HEADER_LEN: usize = 18;

/// Validate image bytes and read their dimensions
pub fn decode_dimensions(format: TextureFormat, path: &str, data: &[u8]) -> MimicResult<(u32, u32)> {
    match format {
        TextureFormat::Png => {
            // Signature, then the IHDR chunk: length, "IHDR", width, height
            if data.len() < 24 || data[..8] != PNG_MAGIC || &data[12..16] != b"IHDR" {
                return Err(invalid(path, "not a PNG image"));
            }
            let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
            let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
            Ok((width, height))
        }
        TextureFormat::Jpeg => jpeg_dimensions(data).ok_or_else(|| invalid(path, "not a JPEG image")),
        TextureFormat::Tga => {
            if data.len() < TGA_HEADER_LEN {
                return Err(invalid(path, "TGA shorter than its header"));
            }
            if !matches!(data[2], 1 | 2 | 3 | 9 | 10 | 11) {
                return Err(invalid(path, format!("unknown TGA image type {}", data[2])));
            }
            let width = u16::from_le_bytes([data[12], data[13]]) as u32;
            let height = u16::from_le_bytes([data[14], data[15]]) as u32;
            Ok((width, height))
        }
    }
}

/// Walk JPEG segments up to the first start-of-frame marker
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[..3] != [0xFF, 0xD8, 0xFF] {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        // SOF0..SOF3
        if (0xC0..=0xC3).contains(&marker) {
            let sof = data.get(pos + 5..pos + 9)?;
            let height = u16::from_be_bytes([sof[0], sof[1]]) as u32;
            let width = u16::from_be_bytes([sof[2], sof[3]]) as u32;
            return Some((width, height));
        }
        pos += 2 + len;
    }
    None
}

async fn load_one<S: AssetSource>(source: &S, spec: &TextureSpec) -> MimicResult<Texture> {
    let format = spec
        .format
        .or_else(|| TextureFormat::from_path(&spec.path))
        .ok_or_else(|| MimicError::AssetFormatUnsupported(format!("texture {}", spec.path)))?;
    let data = source.fetch(&spec.path, ProgressReporter::silent()).await?;
    let (width, height) = decode_dimensions(format, &spec.path, &data)?;
    Ok(Texture {
        source: spec.path.clone(),
        width,
        height,
    })
}

/// Apply textures onto `base`. Failures are logged and leave the slot untouched.
pub async fn load_materials<S: AssetSource>(
    source: &S,
    specs: &[TextureSpec],
    base: MaterialSet,
) -> MaterialSet {
    let mut set = base;
    for spec in specs {
        match load_one(source, spec).await {
            Ok(texture) => {
                tracing::info!(
                    path = %spec.path,
                    slot = ?spec.slot,
                    width = texture.width,
                    height = texture.height,
                    "texture loaded"
                );
                let material = set.slot_mut(spec.slot);
                material.color = Color::WHITE;
                material.texture = Some(texture);
            }
            Err(e) => {
                tracing::warn!(path = %spec.path, slot = ?spec.slot, error = %e, "texture unavailable, keeping default material");
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySource;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    fn tga(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0u8; TGA_HEADER_LEN];
        data[2] = 2;
        data[12..14].copy_from_slice(&width.to_le_bytes());
        data[14..16].copy_from_slice(&height.to_le_bytes());
        data
    }

    #[test]
    fn test_png_and_tga_dimensions() {
        assert_eq!(
            decode_dimensions(TextureFormat::Png, "a.png", &png(512, 256)).unwrap(),
            (512, 256)
        );
        assert_eq!(
            decode_dimensions(TextureFormat::Tga, "a.tga", &tga(64, 32)).unwrap(),
            (64, 32)
        );
        assert!(decode_dimensions(TextureFormat::Png, "a.png", &tga(1, 1)).is_err());
        assert!(decode_dimensions(TextureFormat::Tga, "a.tga", &[0; 5]).is_err());
    }

    #[test]
    fn test_jpeg_dimensions() {
        let jpeg = [
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, // APP0, 2 payload bytes
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x20, 0x00, 0x40, // SOF0: 32 x 64
        ];
        assert_eq!(
            decode_dimensions(TextureFormat::Jpeg, "a.jpg", &jpeg).unwrap(),
            (64, 32)
        );
        assert!(decode_dimensions(TextureFormat::Jpeg, "a.jpg", b"GIF89a").is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TextureFormat::from_path("skin.TGA"), Some(TextureFormat::Tga));
        assert_eq!(TextureFormat::from_path("skin.jpeg"), Some(TextureFormat::Jpeg));
        assert_eq!(TextureFormat::from_path("skin"), None);
    }

    #[tokio::test]
    async fn test_failed_texture_keeps_default() {
        let source = MemorySource::new();
        source.insert("head.png", png(256, 256));
        source.insert("body.tga", &b"garbage"[..]);

        let specs = [
            TextureSpec::new(MaterialSlot::Head, "head.png"),
            TextureSpec::new(MaterialSlot::Body, "body.tga"),
        ];
        let set = load_materials(&source, &specs, MaterialSet::default()).await;

        assert_eq!(set.head.texture.as_ref().map(|t| t.width), Some(256));
        assert_eq!(set.body, MaterialSet::default().body);
    }
}
