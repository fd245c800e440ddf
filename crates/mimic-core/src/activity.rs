//! Speech activity - how open the mouth should be, right now
//!
//! The activity value is written by exactly one producer (the activity
//! source) and read by the animation driver once per tick. The split
//! writer/reader handles enforce the single-writer rule at the type level.

use std::sync::Arc;

use parking_lot::RwLock;

/// Snapshot of the speech activity signal
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpeechActivity {
    /// Mouth openness [0.0 - 1.0]
    pub value: f32,
    /// True from synthesis start until the closing decay completes
    pub active: bool,
}

impl SpeechActivity {
    /// Silent, closed mouth
    pub const SILENT: SpeechActivity = SpeechActivity {
        value: 0.0,
        active: false,
    };

    /// Build a snapshot, clamping the value into [0, 1]
    pub fn new(value: f32, active: bool) -> Self {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { value, active }
    }

    /// Is the value below the given threshold?
    pub fn is_quiet(&self, threshold: f32) -> bool {
        self.value < threshold
    }
}

/// Create a connected writer/reader pair starting at `SpeechActivity::SILENT`
pub fn activity_channel() -> (ActivityWriter, ActivityReader) {
    let cell = Arc::new(RwLock::new(SpeechActivity::SILENT));
    (
        ActivityWriter {
            cell: Arc::clone(&cell),
        },
        ActivityReader { cell },
    )
}

/// The single writer of the activity signal (intentionally not `Clone`)
#[derive(Debug)]
pub struct ActivityWriter {
    cell: Arc<RwLock<SpeechActivity>>,
}

impl ActivityWriter {
    /// Publish a new value
    pub fn publish(&self, activity: SpeechActivity) {
        *self.cell.write() = activity;
    }

    /// Obtain another reader for this signal
    pub fn reader(&self) -> ActivityReader {
        ActivityReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// A reader of the activity signal
#[derive(Debug, Clone)]
pub struct ActivityReader {
    cell: Arc<RwLock<SpeechActivity>>,
}

impl ActivityReader {
    /// Copy out the current value; one consistent snapshot per call
    pub fn snapshot(&self) -> SpeechActivity {
        *self.cell.read()
    }
}
