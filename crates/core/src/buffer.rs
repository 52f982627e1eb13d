//! Shared response log drained by the presentation layer
//!
//! One producer (the reader task) plus the write path push entries; any
//! number of request handlers drain them. The lock is only held for the
//! duration of a single push or drain, so it is safe to use from both
//! blocking threads and async handlers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::ResponseEntry;

/// Thread-safe FIFO of response entries
///
/// Unbounded by default. A bounded buffer drops the oldest entry when full.
#[derive(Clone, Debug, Default)]
pub struct ResponseBuffer {
    inner: Arc<Mutex<VecDeque<ResponseEntry>>>,
    capacity: Option<usize>,
}

impl ResponseBuffer {
    /// Create unbounded buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create buffer holding at most `capacity` entries (minimum 1)
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: Some(capacity),
        }
    }

    /// Append entry to the tail
    pub fn push(&self, entry: ResponseEntry) {
        let mut queue = self.lock();
        if let Some(cap) = self.capacity {
            while queue.len() >= cap {
                if let Some(dropped) = queue.pop_front() {
                    tracing::trace!("Response buffer full, dropped: {}", dropped);
                }
            }
        }
        queue.push_back(entry);
    }

    /// Remove and return every queued entry, oldest first
    pub fn drain_all(&self) -> Vec<ResponseEntry> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum entries held, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    // A panic while holding the lock cannot leave the queue half-mutated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ResponseEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
