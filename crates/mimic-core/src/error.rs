//! Error types for MIMIC

use std::time::Duration;

use thiserror::Error;

use crate::NodeId;

/// Core MIMIC errors
#[derive(Error, Debug)]
pub enum MimicError {
    // Asset errors (recovered by fallback/retry inside the loader)
    #[error("Asset format unsupported: {0}")]
    AssetFormatUnsupported(String),

    #[error("Asset I/O failure for {path}: {reason}")]
    AssetIOFailure { path: String, reason: String },

    #[error("Asset parse failure for {path}: {reason}")]
    AssetParseFailure { path: String, reason: String },

    #[error("Asset load timed out after {after:?}: {path}")]
    AssetLoadTimeout { path: String, after: Duration },

    /// Every candidate failed on every pass
    #[error("Asset load failed after {attempts} attempts over {passes} passes: {last_error}")]
    AssetLoadFatal {
        attempts: u32,
        passes: u32,
        last_error: String,
    },

    // Speech errors
    #[error("Speech backend unavailable")]
    SpeechBackendUnavailable,

    // Animation errors
    #[error("No animatable targets found")]
    NoAnimatableTargetsFound,

    #[error("Stale node reference: {0:?}")]
    StaleNode(NodeId),

    // Scene / render errors
    #[error("Scene initialization failed: {0}")]
    SceneInit(String),

    #[error("Render failed: {0}")]
    Render(String),

    // Session errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session torn down")]
    SessionTornDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MimicError {
    /// Can the component that hit this error carry on by itself?
    ///
    /// Loader-level asset failures trigger fallback, render hiccups skip a
    /// frame, and the degraded speech/target cases are non-fatal. Only
    /// `AssetLoadFatal` and `SceneInit` must reach the UI layer.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MimicError::AssetLoadFatal { .. }
                | MimicError::SceneInit(_)
                | MimicError::InvalidConfig(_)
                | MimicError::SessionTornDown
        )
    }

    /// Is this one of the per-candidate asset failures?
    pub fn is_asset_attempt_failure(&self) -> bool {
        matches!(
            self,
            MimicError::AssetFormatUnsupported(_)
                | MimicError::AssetIOFailure { .. }
                | MimicError::AssetParseFailure { .. }
                | MimicError::AssetLoadTimeout { .. }
        )
    }
}

/// Result type for MIMIC operations
pub type MimicResult<T> = Result<T, MimicError>;
