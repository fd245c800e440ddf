//! Fault injection for asset loading
//!
//! Wraps a real source and makes selected fetches misbehave:
//! - Scripted faults per path (fail N times, fail always, stall, corrupt)
//! - Random failures and latency from a seeded RNG

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mimic_asset::{AssetSource, ProgressReporter};
use mimic_core::{MimicError, MimicResult};

/// What to do to fetches of one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail the next `n` fetches, then behave
    FailTimes(u32),
    /// Fail every fetch
    FailAlways,
    /// Sleep before delegating
    Delay(Duration),
    /// Delegate, then replace the payload with garbage
    Corrupt,
}

/// Resolved action for a single fetch
#[derive(Debug, Clone, Copy)]
enum Action {
    Pass,
    Fail,
    Delay(Duration),
    Corrupt,
}

/// Paths requested, in order
#[derive(Debug, Clone, Default)]
pub struct FetchLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl FetchLog {
    fn record(&self, path: &str) {
        self.entries.lock().push(path.to_string());
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fetches of `path` so far
    pub fn count(&self, path: &str) -> usize {
        self.entries.lock().iter().filter(|p| *p == path).count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn injected(path: &str, reason: &str) -> MimicError {
    MimicError::AssetIOFailure {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Source with per-path scripted faults. Clones share faults and log.
#[derive(Debug, Clone)]
pub struct ScriptedSource<S> {
    inner: S,
    faults: Arc<Mutex<HashMap<String, Fault>>>,
    log: FetchLog,
}

impl<S: AssetSource> ScriptedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(HashMap::new())),
            log: FetchLog::default(),
        }
    }

    /// Install `fault` for `path`, replacing any earlier one
    pub fn fault(&self, path: impl Into<String>, fault: Fault) -> &Self {
        self.faults.lock().insert(path.into(), fault);
        self
    }

    pub fn heal(&self, path: &str) {
        self.faults.lock().remove(path);
    }

    pub fn log(&self) -> &FetchLog {
        &self.log
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn action(&self, path: &str) -> Action {
        let mut faults = self.faults.lock();
        match faults.get_mut(path) {
            None => Action::Pass,
            Some(Fault::FailAlways) => Action::Fail,
            Some(Fault::Delay(d)) => Action::Delay(*d),
            Some(Fault::Corrupt) => Action::Corrupt,
            Some(Fault::FailTimes(remaining)) => {
                if *remaining == 0 {
                    faults.remove(path);
                    Action::Pass
                } else {
                    *remaining -= 1;
                    Action::Fail
                }
            }
        }
    }
}

impl<S: AssetSource> AssetSource for ScriptedSource<S> {
    fn fetch(
        &self,
        path: &str,
        progress: ProgressReporter,
    ) -> impl Future<Output = MimicResult<Bytes>> + Send {
        self.log.record(path);
        let action = self.action(path);
        let inner = self.inner.fetch(path, progress);
        let path = path.to_string();
        async move {
            match action {
                Action::Pass => inner.await,
                Action::Fail => {
                    tracing::debug!(path = %path, "injected fetch failure");
                    Err(injected(&path, "injected failure"))
                }
                Action::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    inner.await
                }
                Action::Corrupt => {
                    inner.await?;
                    Ok(Bytes::from_static(b"\x00\x01 corrupted payload"))
                }
            }
        }
    }
}

/// Random fault profile
#[derive(Debug, Clone)]
pub struct FlakyConfig {
    /// Fetch failure rate (0.0 - 1.0)
    pub failure_rate: f64,
    /// Added latency range (min, max)
    pub latency: (Duration, Duration),
    pub seed: u64,
}

impl Default for FlakyConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

impl FlakyConfig {
    /// Local disk
    pub fn reliable() -> Self {
        Self {
            failure_rate: 0.0,
            latency: (Duration::ZERO, Duration::from_millis(5)),
            seed: 42,
        }
    }

    /// Congested CDN
    pub fn unreliable() -> Self {
        Self {
            failure_rate: 0.4,
            latency: (Duration::from_millis(50), Duration::from_millis(800)),
            seed: 42,
        }
    }

    /// Nothing ever arrives
    pub fn dead() -> Self {
        Self {
            failure_rate: 1.0,
            latency: (Duration::ZERO, Duration::ZERO),
            seed: 42,
        }
    }
}

/// Source that fails and stalls at random, reproducibly per seed
#[derive(Debug, Clone)]
pub struct FlakySource<S> {
    inner: S,
    config: FlakyConfig,
    rng: Arc<Mutex<StdRng>>,
    log: FetchLog,
}

impl<S: AssetSource> FlakySource<S> {
    pub fn new(inner: S, config: FlakyConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng: Arc::new(Mutex::new(rng)),
            log: FetchLog::default(),
        }
    }

    pub fn log(&self) -> &FetchLog {
        &self.log
    }

    fn roll(&self) -> (bool, Duration) {
        let mut rng = self.rng.lock();
        let fail = rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0));
        let (min, max) = self.config.latency;
        let latency = if max > min {
            let micros = Uniform::new(min.as_micros() as u64, max.as_micros() as u64);
            Duration::from_micros(micros.sample(&mut *rng))
        } else {
            min
        };
        (fail, latency)
    }
}

impl<S: AssetSource> AssetSource for FlakySource<S> {
    fn fetch(
        &self,
        path: &str,
        progress: ProgressReporter,
    ) -> impl Future<Output = MimicResult<Bytes>> + Send {
        self.log.record(path);
        let (fail, latency) = self.roll();
        let inner = self.inner.fetch(path, progress);
        let path = path.to_string();
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if fail {
                return Err(injected(&path, "flaky source dropped the fetch"));
            }
            inner.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_asset::MemorySource;

    fn source() -> ScriptedSource<MemorySource> {
        let memory = MemorySource::new();
        memory.insert("a.gltf", &b"model"[..]);
        ScriptedSource::new(memory)
    }

    async fn fetch<S: AssetSource>(source: &S, path: &str) -> MimicResult<Bytes> {
        source.fetch(path, ProgressReporter::silent()).await
    }

    #[tokio::test]
    async fn test_fail_times_then_pass() {
        let source = source();
        source.fault("a.gltf", Fault::FailTimes(2));

        assert!(fetch(&source, "a.gltf").await.is_err());
        assert!(fetch(&source, "a.gltf").await.is_err());
        assert_eq!(&fetch(&source, "a.gltf").await.unwrap()[..], b"model");
        assert_eq!(source.log().count("a.gltf"), 3);
    }

    #[tokio::test]
    async fn test_corrupt_replaces_payload() {
        let source = source();
        source.fault("a.gltf", Fault::Corrupt);

        let data = fetch(&source, "a.gltf").await.unwrap();
        assert_ne!(&data[..], b"model");

        source.heal("a.gltf");
        assert_eq!(&fetch(&source, "a.gltf").await.unwrap()[..], b"model");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_stalls() {
        let source = source();
        source.fault("a.gltf", Fault::Delay(Duration::from_secs(10)));

        let started = tokio::time::Instant::now();
        fetch(&source, "a.gltf").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_clones_share_log() {
        let source = source();
        let clone = source.clone();
        fetch(&clone, "a.gltf").await.unwrap();
        fetch(&clone, "missing.gltf").await.unwrap_err();

        assert_eq!(source.log().paths(), vec!["a.gltf", "missing.gltf"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_is_reproducible() {
        let run = || async {
            let memory = MemorySource::new();
            memory.insert("a.gltf", &b"model"[..]);
            let flaky = FlakySource::new(memory, FlakyConfig::unreliable());
            let mut outcomes = Vec::new();
            for _ in 0..20 {
                outcomes.push(fetch(&flaky, "a.gltf").await.is_ok());
            }
            outcomes
        };

        let first = run().await;
        assert_eq!(first, run().await);
        assert!(first.iter().any(|ok| *ok));
        assert!(first.iter().any(|ok| !ok));
    }

    proptest::proptest! {
        #[test]
        fn prop_fail_times_fails_exactly_n(n in 0u32..8, extra in 1u32..4) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let source = source();
            source.fault("a.gltf", Fault::FailTimes(n));

            let outcomes: Vec<bool> = runtime.block_on(async {
                let mut outcomes = Vec::new();
                for _ in 0..(n + extra) {
                    outcomes.push(fetch(&source, "a.gltf").await.is_ok());
                }
                outcomes
            });

            let failures = outcomes.iter().filter(|ok| !**ok).count();
            proptest::prop_assert_eq!(failures, n as usize);
            proptest::prop_assert!(outcomes[n as usize..].iter().all(|ok| *ok));
        }
    }

    #[tokio::test]
    async fn test_dead_source_always_fails() {
        let memory = MemorySource::new();
        memory.insert("a.gltf", &b"model"[..]);
        let flaky = FlakySource::new(memory, FlakyConfig::dead());
        for _ in 0..5 {
            assert!(fetch(&flaky, "a.gltf").await.is_err());
        }
        assert_eq!(flaky.log().len(), 5);
    }
}
