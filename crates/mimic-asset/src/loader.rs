//! Asset loader - ordered fallback with bounded full-list retries
//!
//! ```text
//! pass 1:            A -> B -> C        (first success wins)
//! sleep(backoff)
//! pass 2:            A -> B -> C
//! ...                                   (1 + max_retries passes)
//! AssetLoadFatal     (reported once)
//! ```
//!
//! A candidate is never retried before the whole list has been tried once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mimic_core::{AssetId, MimicError, MimicResult};

use crate::{
    AssetSource, Candidate, FormatRegistry, LoadAttempt, LoadedAsset, ModelData, ProgressReporter,
    ProgressSink,
};

/// Hard cap on additional full passes
pub const MAX_RETRIES_CAP: u32 = 2;

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Additional full passes after the first (at most 2)
    pub max_retries: u32,
    /// Fixed delay before each retry pass
    pub retry_backoff: Duration,
    /// Budget for fetching and parsing one candidate
    pub attempt_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl LoaderConfig {
    /// Fail fast: no retries, no backoff
    pub fn single_pass() -> Self {
        Self {
            max_retries: 0,
            retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> MimicResult<()> {
        if self.max_retries > MAX_RETRIES_CAP {
            return Err(MimicError::InvalidConfig(format!(
                "loader max_retries {} exceeds {}",
                self.max_retries, MAX_RETRIES_CAP
            )));
        }
        if self.attempt_timeout.is_zero() {
            return Err(MimicError::InvalidConfig(
                "loader attempt_timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Total passes over the candidate list
    pub fn passes(&self) -> u32 {
        1 + self.max_retries.min(MAX_RETRIES_CAP)
    }
}

/// Ordered record of the attempts one load made
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempts: Vec<LoadAttempt>,
}

impl LoadReport {
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Attempts made during pass `attempt_number`
    pub fn pass(&self, attempt_number: u32) -> impl Iterator<Item = &LoadAttempt> {
        self.attempts
            .iter()
            .filter(move |a| a.attempt_number == attempt_number)
    }
}

/// Loads models through the fallback chain
pub struct AssetLoader<S> {
    source: Arc<S>,
    registry: Arc<FormatRegistry>,
    config: LoaderConfig,
    next_id: Arc<AtomicU64>,
}

impl<S> Clone for AssetLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S> std::fmt::Debug for AssetLoader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: AssetSource> AssetLoader<S> {
    /// Loader with the default glTF/GLB registry
    pub fn new(source: S, config: LoaderConfig) -> Self {
        Self::with_registry(source, FormatRegistry::default(), config)
    }

    pub fn with_registry(source: S, registry: FormatRegistry, config: LoaderConfig) -> Self {
        Self {
            source: Arc::new(source),
            registry: Arc::new(registry),
            config,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the first candidate that succeeds
    pub async fn load(&self, candidates: &[Candidate]) -> MimicResult<LoadedAsset> {
        self.load_with_progress(candidates, None).await
    }

    /// `load`, reporting per-candidate progress to `sink`
    pub async fn load_with_progress(
        &self,
        candidates: &[Candidate],
        sink: Option<ProgressSink>,
    ) -> MimicResult<LoadedAsset> {
        if candidates.is_empty() {
            let fatal = MimicError::AssetLoadFatal {
                attempts: 0,
                passes: 0,
                last_error: "no candidates".into(),
            };
            tracing::error!(error = %fatal, "asset load failed");
            return Err(fatal);
        }

        let passes = self.config.passes();
        let mut report = LoadReport::default();
        let mut last_error = String::new();

        for pass in 1..=passes {
            if pass > 1 {
                tracing::info!(
                    pass,
                    backoff = ?self.config.retry_backoff,
                    "all candidates failed, retrying"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
            }

            for (index, candidate) in candidates.iter().enumerate() {
                report.attempts.push(LoadAttempt {
                    format: candidate.resolve_format().ok(),
                    path: candidate.path.clone(),
                    attempt_number: pass,
                });
                tracing::info!(path = %candidate.path, candidate = index, attempt = pass, "loading asset");

                let progress = ProgressReporter::new(index, pass, sink.clone());
                match self.attempt(candidate, progress).await {
                    Ok(model) => {
                        let id = AssetId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                        tracing::info!(
                            path = %candidate.path,
                            asset = %id,
                            attempts = report.len(),
                            "asset loaded"
                        );
                        return Ok(LoadedAsset::new(id, candidate.clone(), model, report));
                    }
                    Err(e) => {
                        tracing::warn!(path = %candidate.path, attempt = pass, error = %e, "asset candidate failed");
                        last_error = e.to_string();
                    }
                }
            }
        }

        let fatal = MimicError::AssetLoadFatal {
            attempts: report.len() as u32,
            passes,
            last_error,
        };
        tracing::error!(error = %fatal, "asset load failed");
        Err(fatal)
    }

    async fn attempt(&self, candidate: &Candidate, progress: ProgressReporter) -> MimicResult<ModelData> {
        let format = candidate.resolve_format()?;
        let loader = Arc::clone(self.registry.get(format)?);

        let work = async {
            let data = self.source.fetch(&candidate.path, progress).await?;
            loader.parse(&candidate.path, &data)
        };
        match tokio::time::timeout(self.config.attempt_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(MimicError::AssetLoadTimeout {
                path: candidate.path.clone(),
                after: self.config.attempt_timeout,
            }),
        }
    }
}
