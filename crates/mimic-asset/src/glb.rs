//! GLB binary container
//!
//! ```text
//! header: magic "glTF" | version u32 | total length u32       (12 bytes, LE)
//! chunk:  length u32 | type u32 | payload (4-byte aligned)
//! ```
//!
//! The first chunk must be JSON; an optional BIN chunk follows.

use bytes::{Buf, Bytes};

use mimic_core::{MimicError, MimicResult};

const MAGIC: u32 = 0x4654_6C67; // "glTF"
const VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

/// Chunks of a GLB file
#[derive(Debug, Clone)]
pub struct GlbChunks {
    pub json: Bytes,
    pub bin: Option<Bytes>,
}

fn parse_failure(path: &str, reason: impl Into<String>) -> MimicError {
    MimicError::AssetParseFailure {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Split a GLB file into its JSON and BIN chunks
pub fn split(path: &str, data: &Bytes) -> MimicResult<GlbChunks> {
    if data.len() < HEADER_LEN {
        return Err(parse_failure(path, "GLB shorter than its header"));
    }

    let mut buf = data.clone();
    let magic = buf.get_u32_le();
    let version = buf.get_u32_le();
    let length = buf.get_u32_le() as usize;

    if magic != MAGIC {
        return Err(parse_failure(path, "not a GLB file (bad magic)"));
    }
    if version != VERSION {
        return Err(parse_failure(path, format!("unsupported GLB version {version}")));
    }
    if length < HEADER_LEN {
        return Err(parse_failure(path, format!("GLB declares impossible length {length}")));
    }
    if length > data.len() {
        return Err(parse_failure(
            path,
            format!("GLB declares {length} bytes but only {} present", data.len()),
        ));
    }
    buf.truncate(length - HEADER_LEN);

    let mut json = None;
    let mut bin = None;
    while buf.remaining() >= CHUNK_HEADER_LEN {
        let chunk_len = buf.get_u32_le() as usize;
        let chunk_type = buf.get_u32_le();
        if chunk_len > buf.remaining() {
            return Err(parse_failure(path, "GLB chunk runs past end of file"));
        }
        let payload = buf.split_to(chunk_len);

        match chunk_type {
            CHUNK_JSON if json.is_none() => json = Some(payload),
            CHUNK_JSON => return Err(parse_failure(path, "GLB has more than one JSON chunk")),
            CHUNK_BIN if json.is_none() => {
                return Err(parse_failure(path, "GLB BIN chunk before JSON chunk"))
            }
            CHUNK_BIN if bin.is_none() => bin = Some(payload),
            // Unknown chunks are skipped
            _ => {}
        }
    }

    let json = json.ok_or_else(|| parse_failure(path, "GLB has no JSON chunk"))?;
    Ok(GlbChunks { json, bin })
}
