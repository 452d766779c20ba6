use crate::types::ErrorEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Append-only queue of captured events awaiting pattern processing.
///
/// Unbounded between drains; the capture path signals an opportunistic drain
/// once the queue crosses its threshold. The drain guard makes concurrent
/// drain requests no-ops: events buffered while a drain runs stay queued for
/// the next one.
pub struct EventBuffer {
    queue: Mutex<Vec<ErrorEvent>>,
    draining: AtomicBool,
    threshold: usize,
}

impl EventBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
            threshold,
        }
    }

    /// Append an event. Returns true when the queue has reached the drain
    /// threshold.
    pub fn push(&self, event: ErrorEvent) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.push(event);
        queue.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        let queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim the drain. Returns `None` when a drain is already in progress;
    /// the caller must treat that as a successful no-op.
    pub fn begin_drain(&self) -> Option<DrainGuard<'_>> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(DrainGuard { buffer: self })
        } else {
            None
        }
    }

    fn take_all(&self) -> Vec<ErrorEvent> {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *queue)
    }
}

/// Exclusive hold on the drain; released on drop so a panicking drain does
/// not wedge the pipeline.
pub struct DrainGuard<'a> {
    buffer: &'a EventBuffer,
}

impl DrainGuard<'_> {
    /// Atomically swap the queue for an empty one and return the batch.
    pub fn take_batch(&self) -> Vec<ErrorEvent> {
        self.buffer.take_all()
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.buffer.draining.store(false, Ordering::Release);
    }
}
