//! Load progress reporting

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Progress of one in-flight candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    /// Position in the candidate list (0 = primary)
    pub candidate_index: usize,
    pub attempt: u32,
    /// 0 - 100
    pub percent: u8,
}

impl LoadProgress {
    /// Is this progress of the primary candidate?
    pub fn is_primary(&self) -> bool {
        self.candidate_index == 0
    }
}

/// Consumer of progress updates
pub type ProgressSink = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// Per-attempt progress emitter; never reports a lower percentage than before
#[derive(Clone)]
pub struct ProgressReporter {
    candidate_index: usize,
    attempt: u32,
    sink: Option<ProgressSink>,
    last: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(candidate_index: usize, attempt: u32, sink: Option<ProgressSink>) -> Self {
        Self {
            candidate_index,
            attempt,
            sink,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Reporter that discards everything
    pub fn silent() -> Self {
        Self::new(0, 1, None)
    }

    /// Report `done` of `total` bytes
    pub fn bytes(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        self.percent(percent);
    }

    /// Report a percentage; values not above the last report are dropped
    pub fn percent(&self, percent: u8) {
        let percent = percent.min(100);
        let prev = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent <= prev {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(LoadProgress {
                candidate_index: self.candidate_index,
                attempt: self.attempt,
                percent,
            });
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("candidate_index", &self.candidate_index)
            .field("attempt", &self.attempt)
            .field("last", &self.last_percent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording() -> (ProgressSink, Arc<Mutex<Vec<LoadProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().push(p));
        (sink, seen)
    }

    #[test]
    fn test_progress_is_monotonic() {
        let (sink, seen) = recording();
        let reporter = ProgressReporter::new(1, 2, Some(sink));

        reporter.bytes(10, 100);
        reporter.bytes(5, 100);
        reporter.bytes(50, 100);
        reporter.bytes(50, 100);
        reporter.bytes(100, 100);

        let percents: Vec<u8> = seen.lock().iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![10, 50, 100]);
        assert!(seen.lock().iter().all(|p| !p.is_primary() && p.attempt == 2));
    }

    #[test]
    fn test_empty_file_is_complete() {
        let (sink, seen) = recording();
        ProgressReporter::new(0, 1, Some(sink)).bytes(0, 0);
        assert_eq!(seen.lock()[0].percent, 100);
        assert!(seen.lock()[0].is_primary());
    }
}
