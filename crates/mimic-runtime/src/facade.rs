//! The surface a UI talks to

use std::sync::Arc;

use parking_lot::Mutex;

use mimic_core::ActivityReader;

use crate::SpeechController;

/// Read-only avatar state plus the one command a UI may issue
#[derive(Debug, Clone)]
pub struct AvatarFacade {
    speech: Arc<Mutex<SpeechController>>,
    reader: ActivityReader,
}

impl AvatarFacade {
    pub(crate) fn new(speech: Arc<Mutex<SpeechController>>, reader: ActivityReader) -> Self {
        Self { speech, reader }
    }

    pub fn is_speaking(&self) -> bool {
        self.reader.snapshot().active
    }

    /// Current mouth opening [0.0 - 1.0]
    pub fn mouth_openness(&self) -> f32 {
        self.reader.snapshot().value
    }

    /// Say `text`, interrupting anything in progress
    pub fn speak(&self, text: &str) -> bool {
        self.speech.lock().speak(text)
    }
}
