//! Cancellable timers
//!
//! Every periodic activity in a session (frame loop, speech ticks, blinks)
//! runs as a tokio task owned by a `TimerHandle`. Cancelling is idempotent
//! and also happens on drop, so a handle can never leak a callback that
//! outlives the resources it touches.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Owned handle to a spawned timer task
#[derive(Debug)]
pub struct TimerHandle {
    name: &'static str,
    task: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Spawn a future as a named timer task
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(future);
        tracing::trace!(timer = name, "timer spawned");
        TimerHandle {
            name,
            task: Some(task),
            cancelled,
        }
    }

    /// Spawn a periodic callback. The callback returns `false` to stop.
    ///
    /// Missed ticks are skipped rather than bursted, matching a per-frame
    /// callback that simply fires late.
    pub fn interval<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if flag.load(Ordering::Acquire) || !tick() {
                    break;
                }
            }
        });
        tracing::trace!(timer = name, ?period, "interval timer spawned");
        TimerHandle {
            name,
            task: Some(task),
            cancelled,
        }
    }

    /// Stop the timer. Safe to call any number of times.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!(timer = self.name, "timer cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Has the task completed (or been cancelled)?
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A group of timers cancelled together
#[derive(Debug, Default)]
pub struct TimerSet {
    timers: Vec<TimerHandle>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, timer: TimerHandle) {
        self.timers.push(timer);
    }

    /// Cancel and drop every timer. Idempotent.
    pub fn cancel_all(&mut self) {
        for timer in &mut self.timers {
            timer.cancel();
        }
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
