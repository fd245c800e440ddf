//! Speech backends
//!
//! A backend turns text into speech and reports lifecycle events. The avatar
//! only cares about when speech starts, how loud it roughly is, and when it
//! ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mimic_core::{MimicError, MimicResult, UtteranceId};

/// Backend lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Audio output began
    Started { duration_hint: Option<Duration> },
    /// Periodic loudness estimate [0.0 - 1.0]
    Tick { volume_hint: f32 },
    /// Utterance finished normally
    Ended,
    /// Synthesis error
    Failed(String),
}

/// Event stream of one utterance. Closed when the utterance ends or is cancelled.
#[derive(Debug)]
pub struct UtteranceStream {
    id: UtteranceId,
    events: mpsc::UnboundedReceiver<SpeechEvent>,
}

impl UtteranceStream {
    /// Create a stream and the sender a backend feeds it through
    pub fn channel(id: UtteranceId) -> (mpsc::UnboundedSender<SpeechEvent>, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        (tx, UtteranceStream { id, events })
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Next event, `None` once the backend is done with this utterance
    pub async fn next(&mut self) -> Option<SpeechEvent> {
        self.events.recv().await
    }
}

/// A text-to-speech engine
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Can `speak` currently produce audio?
    fn is_available(&self) -> bool;

    /// Begin speaking `text`, replacing any ongoing utterance
    fn speak(&self, text: &str) -> MimicResult<UtteranceStream>;

    /// Abort the ongoing utterance, if any. No further events are emitted.
    fn cancel(&self);
}

/// Simulated backend configuration
#[derive(Debug, Clone)]
pub struct SimulatedSpeechConfig {
    /// Speaking rate used to estimate utterance length
    pub words_per_minute: f32,
    /// Floor for very short utterances
    pub min_duration: Duration,
    /// Period of volume hints
    pub tick_interval: Duration,
    /// Fixed RNG seed for volume hints (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for SimulatedSpeechConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 165.0,
            min_duration: Duration::from_millis(400),
            tick_interval: Duration::from_millis(100),
            seed: None,
        }
    }
}

/// Backend that pretends to speak, timing utterances from their word count
#[derive(Debug)]
pub struct SimulatedSpeechBackend {
    config: SimulatedSpeechConfig,
    next_id: AtomicU64,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedSpeechBackend {
    pub fn new(config: SimulatedSpeechConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    /// How long `text` takes to say
    pub fn estimate_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as f32;
        let wpm = self.config.words_per_minute.max(1.0);
        Duration::from_secs_f32(words * 60.0 / wpm).max(self.config.min_duration)
    }
}

impl Default for SimulatedSpeechBackend {
    fn default() -> Self {
        Self::new(SimulatedSpeechConfig::default())
    }
}

impl SpeechBackend for SimulatedSpeechBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn speak(&self, text: &str) -> MimicResult<UtteranceStream> {
        self.cancel();

        let id = UtteranceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let duration = self.estimate_duration(text);
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ id.0),
            None => StdRng::from_entropy(),
        };
        let (tx, stream) = UtteranceStream::channel(id);

        tracing::debug!(utterance = id.0, ?duration, "simulated speech started");
        let task = tokio::spawn(async move {
            if tx
                .send(SpeechEvent::Started {
                    duration_hint: Some(duration),
                })
                .is_err()
            {
                return;
            }

            let mut elapsed = Duration::ZERO;
            while elapsed < duration {
                let step = period.min(duration - elapsed);
                tokio::time::sleep(step).await;
                elapsed += step;
                let volume_hint = rng.gen_range(0.6..=1.0);
                if tx.send(SpeechEvent::Tick { volume_hint }).is_err() {
                    return;
                }
            }
            let _ = tx.send(SpeechEvent::Ended);
        });

        *self.current.lock() = Some(task);
        Ok(stream)
    }

    fn cancel(&self) {
        if let Some(task) = self.current.lock().take() {
            if !task.is_finished() {
                tracing::debug!("simulated speech cancelled");
            }
            task.abort();
        }
    }
}

impl Drop for SimulatedSpeechBackend {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Backend for platforms without speech synthesis
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl SpeechBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str) -> MimicResult<UtteranceStream> {
        Err(MimicError::SpeechBackendUnavailable)
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SimulatedSpeechBackend {
        SimulatedSpeechBackend::new(SimulatedSpeechConfig {
            seed: Some(3),
            ..Default::default()
        })
    }

    #[test]
    fn test_estimate_duration() {
        let backend = seeded();

        // 165 words per minute
        let d = backend.estimate_duration(&"word ".repeat(165));
        assert!((d.as_secs_f32() - 60.0).abs() < 0.01);

        assert_eq!(backend.estimate_duration("hi"), Duration::from_millis(400));
        assert_eq!(backend.estimate_duration(""), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_event_sequence() {
        let backend = seeded();
        let mut stream = backend.speak("hello there").unwrap();

        assert_eq!(
            stream.next().await,
            Some(SpeechEvent::Started {
                duration_hint: Some(Duration::from_millis(400))
            })
        );

        let mut ticks = 0;
        let mut ended = false;
        while let Some(event) = stream.next().await {
            match event {
                SpeechEvent::Tick { volume_hint } => {
                    assert!((0.6..=1.0).contains(&volume_hint));
                    ticks += 1;
                }
                SpeechEvent::Ended => ended = true,
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(ticks, 4);
        assert!(ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_events() {
        let backend = seeded();
        let mut stream = backend.speak("a fairly long sentence to say out loud").unwrap();
        assert!(matches!(
            stream.next().await,
            Some(SpeechEvent::Started { .. })
        ));

        backend.cancel();
        backend.cancel();

        // Sender dropped by the aborted task: stream closes without `Ended`
        while let Some(event) = stream.next().await {
            assert_ne!(event, SpeechEvent::Ended);
        }
    }

    #[tokio::test]
    async fn test_new_utterance_replaces_old() {
        let backend = seeded();
        let first = backend.speak("one").unwrap();
        let second = backend.speak("two").unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_unavailable_backend() {
        let backend = UnavailableBackend;
        assert!(!backend.is_available());
        assert!(matches!(
            backend.speak("hello"),
            Err(MimicError::SpeechBackendUnavailable)
        ));
    }
}
