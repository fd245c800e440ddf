//! Asset sources - where model and texture bytes come from

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use tokio::io::AsyncReadExt;

use mimic_core::{MimicError, MimicResult};

use crate::ProgressReporter;

/// Fetches raw asset bytes by path
pub trait AssetSource: Send + Sync {
    fn fetch(
        &self,
        path: &str,
        progress: ProgressReporter,
    ) -> impl Future<Output = MimicResult<Bytes>> + Send;
}

fn io_failure(path: &str, err: impl std::fmt::Display) -> MimicError {
    MimicError::AssetIOFailure {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

/// Filesystem source with chunked reads
#[derive(Debug, Clone)]
pub struct FsSource {
    root: Option<PathBuf>,
    chunk_size: usize,
}

impl FsSource {
    pub const DEFAULT_CHUNK: usize = 64 * 1024;

    /// Paths resolve relative to the working directory
    pub fn new() -> Self {
        Self {
            root: None,
            chunk_size: Self::DEFAULT_CHUNK,
        }
    }

    /// Paths resolve relative to `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            chunk_size: Self::DEFAULT_CHUNK,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetSource for FsSource {
    fn fetch(
        &self,
        path: &str,
        progress: ProgressReporter,
    ) -> impl Future<Output = MimicResult<Bytes>> + Send {
        let full = self.resolve(path);
        let path = path.to_string();
        let chunk_size = self.chunk_size;
        async move {
            let mut file = tokio::fs::File::open(&full)
                .await
                .map_err(|e| io_failure(&path, e))?;
            let total = file
                .metadata()
                .await
                .map_err(|e| io_failure(&path, e))?
                .len();

            let mut data = BytesMut::with_capacity(total as usize);
            let mut chunk = vec![0u8; chunk_size];
            loop {
                let n = file
                    .read(&mut chunk)
                    .await
                    .map_err(|e| io_failure(&path, e))?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
                progress.bytes(data.len() as u64, total);
            }
            progress.percent(100);

            tracing::trace!(path = %path, bytes = data.len(), "asset read from disk");
            Ok(data.freeze())
        }
    }
}

/// In-memory source for embedded assets and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.files.write().insert(path.into(), data.into());
    }

    pub fn remove(&self, path: &str) -> Option<Bytes> {
        self.files.write().remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }
}

impl AssetSource for MemorySource {
    fn fetch(
        &self,
        path: &str,
        progress: ProgressReporter,
    ) -> impl Future<Output = MimicResult<Bytes>> + Send {
        let found = self.files.read().get(path).cloned();
        let path = path.to_string();
        async move {
            let data = found.ok_or_else(|| io_failure(&path, "not found"))?;
            progress.bytes(data.len() as u64, data.len() as u64);
            Ok(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new();
        source.insert("a.gltf", &b"{}"[..]);

        let data = source.fetch("a.gltf", ProgressReporter::silent()).await.unwrap();
        assert_eq!(&data[..], b"{}");

        let err = source
            .fetch("missing.gltf", ProgressReporter::silent())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Asset I/O failure for missing.gltf: not found");
    }

    #[tokio::test]
    async fn test_fs_source_chunked_with_progress() {
        let dir = std::env::temp_dir().join(format!("mimic-fs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.bin"), vec![7u8; 1000]).unwrap();

        let reports = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&reports);
        let sink: crate::ProgressSink = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let source = FsSource::with_root(&dir).with_chunk_size(100);
        let progress = ProgressReporter::new(0, 1, Some(sink));
        let data = source.fetch("/model.bin", progress.clone()).await.unwrap();

        assert_eq!(data.len(), 1000);
        assert_eq!(progress.last_percent(), 100);
        // At most one report per 100-byte chunk
        assert!((1..=10).contains(&reports.load(Ordering::SeqCst)));

        let missing = source.fetch("nope.glb", ProgressReporter::silent()).await;
        assert!(matches!(missing, Err(MimicError::AssetIOFailure { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }
}
