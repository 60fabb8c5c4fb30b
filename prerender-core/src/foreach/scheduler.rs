//! Render Scheduling
//!
//! Changes that arrive between frames share one queue and one flush.
//!
//! # State machine
//!
//! ```text
//!            enqueue (non-empty)               finish (queue empty)
//!   Idle ─────────────────────────▶ FlushScheduled ─────────────────▶ Idle
//!                                    │        ▲
//!                                    └────────┘
//!                       enqueue: append only, no new frame
//!                       finish with leftovers: request another frame
//! ```
//!
//! Frames are requested through `FrameScheduler`, so the production timer
//! can be swapped for a synchronous or hand-cranked one.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::classify::QueuedChange;
use crate::error::{HydrateError, Result};

/// Work to run on the next frame.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Runs a callback once, at some later frame.
pub trait FrameScheduler: Send + Sync {
    fn schedule_once(&self, callback: FrameCallback);
}

/// Runs callbacks immediately, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl FrameScheduler for ImmediateScheduler {
    fn schedule_once(&self, callback: FrameCallback) {
        callback();
    }
}

/// Holds callbacks until `run_pending` is called.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<FrameCallback>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames requested and not yet run.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run every callback requested so far. Callbacks requested while these
    /// run are kept for the next call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.pending.lock());
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule_once(&self, callback: FrameCallback) {
        self.pending.lock().push(callback);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Default frame length: 60 frames per second.
pub const FRAME_INTERVAL: Duration = Duration::from_micros(1_000_000 / 60);

/// Fixed-rate frame timer on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TimerScheduler {
    handle: Handle,
    interval: Duration,
}

impl TimerScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            interval: FRAME_INTERVAL,
        }
    }

    /// Use the runtime the caller is running on.
    pub fn from_current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| HydrateError::NoRuntime)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for TimerScheduler {
    fn schedule_once(&self, callback: FrameCallback) {
        let interval = self.interval;
        self.handle.spawn(async move {
            tokio::time::sleep(interval).await;
            callback();
        });
    }
}

/// Whether a frame has been requested for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    #[default]
    Idle,
    FlushScheduled,
}

/// Pending operations of one list binding plus its flush state.
#[derive(Debug, Default)]
pub struct RenderQueue {
    changes: Vec<QueuedChange>,
    state: FlushState,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append operations. Returns true when the caller must request a frame.
    pub fn enqueue<I>(&mut self, changes: I) -> bool
    where
        I: IntoIterator<Item = QueuedChange>,
    {
        self.changes.extend(changes);
        if self.changes.is_empty() || self.state == FlushState::FlushScheduled {
            return false;
        }
        self.state = FlushState::FlushScheduled;
        true
    }

    /// Take everything queued so far, in FIFO order.
    pub fn take_batch(&mut self) -> Vec<QueuedChange> {
        std::mem::take(&mut self.changes)
    }

    /// End a flush. Returns true when work arrived during the flush and
    /// another frame is needed; the state then stays `FlushScheduled`.
    pub fn finish(&mut self) -> bool {
        if self.changes.is_empty() {
            self.state = FlushState::Idle;
            false
        } else {
            true
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn added(index: usize) -> QueuedChange {
        QueuedChange::Added { index, value: json!(index) }
    }

    #[test]
    fn only_the_first_enqueue_requests_a_frame() {
        let mut queue = RenderQueue::new();

        assert!(queue.enqueue([added(0)]));
        assert!(!queue.enqueue([added(1)]));
        assert_eq!(queue.state(), FlushState::FlushScheduled);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn empty_enqueue_stays_idle() {
        let mut queue = RenderQueue::new();
        assert!(!queue.enqueue(Vec::new()));
        assert_eq!(queue.state(), FlushState::Idle);
    }

    #[test]
    fn finish_returns_to_idle_when_drained() {
        let mut queue = RenderQueue::new();
        queue.enqueue([added(0)]);

        assert_eq!(queue.take_batch().len(), 1);
        assert!(!queue.finish());
        assert_eq!(queue.state(), FlushState::Idle);
    }

    #[test]
    fn work_arriving_mid_flush_keeps_the_frame() {
        let mut queue = RenderQueue::new();
        queue.enqueue([added(0)]);
        let batch = queue.take_batch();

        assert!(!queue.enqueue([added(1)]));
        assert!(queue.finish());
        assert_eq!(queue.state(), FlushState::FlushScheduled);
        assert_eq!(batch.len(), 1);
        assert_eq!(queue.take_batch(), vec![added(1)]);
    }

    #[test]
    fn manual_scheduler_defers_until_run() {
        let scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        scheduler.schedule_once(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn timer_requires_a_runtime() {
        assert!(matches!(TimerScheduler::from_current(), Err(HydrateError::NoRuntime)));
    }

    #[tokio::test]
    async fn timer_runs_the_callback_after_a_frame() {
        let scheduler = TimerScheduler::from_current()
            .expect("runtime")
            .with_interval(Duration::from_millis(1));
        let (tx, rx) = tokio::sync::oneshot::channel();

        scheduler.schedule_once(Box::new(move || {
            let _ = tx.send(());
        }));

        assert!(rx.await.is_ok());
    }
}
