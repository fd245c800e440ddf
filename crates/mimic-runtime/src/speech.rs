//! Speech controller - one utterance at a time
//!
//! `speak` replaces whatever is being said. The utterance runs as a single
//! task that interleaves backend events with the fixed activity tick:
//!
//! ```text
//! select {
//!     event = stream.next()  => source.on_event(event)
//!     _     = ticker.tick()  => source.tick(interval)
//! }   until the stream is closed and the source is idle
//! ```
//!
//! Every cancel bumps a generation stored beside the source. A task that
//! wakes after its utterance was cancelled sees a newer generation and exits
//! without touching the source.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use mimic_core::{activity_channel, ActivityReader, MimicError};
use mimic_time::TimerHandle;
use mimic_voice::{ActivityConfig, SpeechActivitySource, SpeechBackend, UtteranceStream};

/// Activity source plus the utterance allowed to drive it
struct Shared {
    source: SpeechActivitySource,
    generation: u64,
}

impl Shared {
    /// The source, if `generation` is still the current utterance
    fn current(&mut self, generation: u64) -> Option<&mut SpeechActivitySource> {
        (self.generation == generation).then_some(&mut self.source)
    }
}

/// Owns the activity source and the speech backend
pub struct SpeechController {
    backend: Arc<dyn SpeechBackend>,
    shared: Arc<Mutex<Shared>>,
    reader: ActivityReader,
    tick_interval: Duration,
    task: Option<TimerHandle>,
    utterances: u64,
    shut_down: bool,
}

impl SpeechController {
    pub fn new(config: ActivityConfig, backend: Arc<dyn SpeechBackend>) -> Self {
        let (writer, reader) = activity_channel();
        let tick_interval = config.tick_interval;
        Self {
            backend,
            shared: Arc::new(Mutex::new(Shared {
                source: SpeechActivitySource::new(config, writer),
                generation: 0,
            })),
            reader,
            tick_interval,
            task: None,
            utterances: 0,
            shut_down: false,
        }
    }

    /// Read side of the activity signal
    pub fn reader(&self) -> ActivityReader {
        self.reader.clone()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_speaking(&self) -> bool {
        self.reader.snapshot().active
    }

    pub fn utterances(&self) -> u64 {
        self.utterances
    }

    /// Start speaking `text`, cancelling any ongoing utterance.
    ///
    /// Returns `false` when nothing will be said.
    pub fn speak(&mut self, text: &str) -> bool {
        if self.shut_down {
            tracing::warn!("speak after shutdown ignored");
            return false;
        }

        self.cancel_current();

        if !self.backend.is_available() {
            self.shared.lock().source.set_backend_available(false);
            tracing::warn!(
                backend = self.backend.name(),
                error = %MimicError::SpeechBackendUnavailable,
                "cannot speak"
            );
            return false;
        }

        let stream = match self.backend.speak(text) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "cannot speak");
                return false;
            }
        };

        let generation = {
            let mut shared = self.shared.lock();
            shared.source.set_backend_available(true);
            if !shared.source.start(None) {
                return false;
            }
            shared.generation
        };

        self.utterances += 1;
        tracing::info!(
            utterance = stream.id().0,
            words = text.split_whitespace().count(),
            "speaking"
        );
        self.task = Some(TimerHandle::spawn(
            "speech",
            run_utterance(stream, Arc::clone(&self.shared), self.tick_interval, generation),
        ));
        true
    }

    /// Cancel the utterance and close the mouth. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.cancel_current();
        tracing::debug!(utterances = self.utterances, "speech controller shut down");
    }

    fn cancel_current(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
        self.backend.cancel();

        // Close the mouth now rather than leave a stale value behind
        let mut shared = self.shared.lock();
        shared.generation += 1;
        let source = &mut shared.source;
        if source.is_speaking() {
            source.stop();
            for _ in 0..source.max_decay_ticks() {
                source.tick(self.tick_interval);
            }
        }
    }
}

impl std::fmt::Debug for SpeechController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechController")
            .field("backend", &self.backend.name())
            .field("tick_interval", &self.tick_interval)
            .field("utterances", &self.utterances)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

impl Drop for SpeechController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_utterance(
    mut stream: UtteranceStream,
    shared: Arc<Mutex<Shared>>,
    interval: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    let mut open = true;
    loop {
        tokio::select! {
            event = stream.next(), if open => {
                let mut shared = shared.lock();
                let Some(source) = shared.current(generation) else {
                    break;
                };
                match event {
                    Some(event) => source.on_event(event),
                    None => {
                        open = false;
                        source.stop();
                    }
                }
            }
            _ = ticker.tick() => {
                let mut shared = shared.lock();
                let Some(source) = shared.current(generation) else {
                    break;
                };
                source.tick(interval);
                if !source.is_speaking() && !open {
                    break;
                }
            }
        }
    }
    tracing::debug!(utterance = stream.id().0, "utterance finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_voice::{SimulatedSpeechBackend, SimulatedSpeechConfig, UnavailableBackend};

    fn controller() -> SpeechController {
        let backend = SimulatedSpeechBackend::new(SimulatedSpeechConfig {
            seed: Some(11),
            ..Default::default()
        });
        let config = ActivityConfig {
            seed: Some(3),
            ..Default::default()
        };
        SpeechController::new(config, Arc::new(backend))
    }

    #[tokio::test(start_paused = true)]
    async fn test_speak_then_return_to_rest() {
        let mut speech = controller();
        let reader = speech.reader();

        assert!(speech.speak("hello there, how are you today"));
        assert!(speech.is_speaking());

        let mut loudest = 0.0f32;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(reader.snapshot().active);
            loudest = loudest.max(reader.snapshot().value);
        }
        assert!(loudest > 0.0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let rest = reader.snapshot();
        assert!(!rest.active);
        assert_eq!(rest.value, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_backend() {
        let mut speech = SpeechController::new(ActivityConfig::default(), Arc::new(UnavailableBackend));

        assert!(!speech.speak("anyone there?"));
        assert!(!speech.is_speaking());
        assert_eq!(speech.utterances(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speak_replaces_current_utterance() {
        let mut speech = controller();
        assert!(speech.speak("a fairly long sentence that takes a few seconds to say out loud"));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(speech.speak("short"));
        assert!(speech.is_speaking());
        assert_eq!(speech.utterances(), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!speech.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_utterance_cannot_reopen_mouth() {
        let mut speech = controller();
        let reader = speech.reader();
        let stream = speech.backend.speak("words still queued after cancel").unwrap();
        let stale = speech.shared.lock().generation;

        speech.cancel_current();
        run_utterance(stream, Arc::clone(&speech.shared), speech.tick_interval, stale).await;

        assert!(!speech.is_speaking());
        assert!(!speech.shared.lock().source.is_speaking());
        assert_eq!(reader.snapshot().value, 0.0);

        // A fresh utterance still drives the source
        assert!(speech.speak("hello again"));
        assert!(speech.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent_and_closes_mouth() {
        let mut speech = controller();
        let reader = speech.reader();
        speech.speak("one two three four five six");
        tokio::time::sleep(Duration::from_millis(500)).await;

        speech.shutdown();
        speech.shutdown();

        assert_eq!(reader.snapshot().value, 0.0);
        assert!(!reader.snapshot().active);
        assert!(!speech.speak("again"));
    }
}
