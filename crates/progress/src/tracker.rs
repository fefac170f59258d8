//! Progress events and sinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Work done so far by one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Operation name, e.g. `validate`
    pub operation: String,

    /// Items finished
    pub processed: usize,

    /// Items requested
    pub total: usize,
}

impl ProgressEvent {
    /// Completed fraction in [0, 1]. An empty operation counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    /// Whether every item is done.
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Receives progress events. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    /// Progress update.
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        tracing::debug!(
            operation = %event.operation,
            processed = event.processed,
            total = event.total,
            "progress"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct ProgressRecorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent event.
    pub fn last(&self) -> Option<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }
}

impl ProgressSink for ProgressRecorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Thread-safe item counter that emits an event every `interval` items and
/// once more when the last item finishes.
pub struct ProgressCounter<'a> {
    sink: &'a dyn ProgressSink,
    operation: String,
    total: usize,
    interval: usize,
    processed: AtomicUsize,
}

impl<'a> ProgressCounter<'a> {
    /// Start counting. Emits a `0 / total` event immediately.
    pub fn start(
        sink: &'a dyn ProgressSink,
        operation: impl Into<String>,
        total: usize,
        interval: usize,
    ) -> Self {
        let counter = Self {
            sink,
            operation: operation.into(),
            total,
            interval: interval.max(1),
            processed: AtomicUsize::new(0),
        };
        counter.emit(0);
        counter
    }

    /// Record one finished item.
    pub fn tick(&self) {
        let done = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.interval == 0 || done == self.total {
            self.emit(done);
        }
    }

    /// Items finished so far.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Requested item count.
    pub fn total(&self) -> usize {
        self.total
    }

    fn emit(&self, processed: usize) {
        self.sink.on_progress(&ProgressEvent {
            operation: self.operation.clone(),
            processed,
            total: self.total,
        });
    }
}
