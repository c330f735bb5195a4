//! Pending change queue — set/delete operations awaiting persistence
//!
//! Any thread may push; only the flush worker (or an explicit flush) drains.
//! The queue is unbounded and a push only holds the lock for an append.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::entry::ValueType;

/// What a pending change does to its `(key, ValueType)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    /// Upsert the textual value
    Set(String),
    /// Delete marker; the removal already happened on the caller's thread
    Tombstone,
}

/// A queued change, consumed exactly once by a flush cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub key: String,
    pub value_type: ValueType,
    pub op: ChangeOp,
}

impl PendingChange {
    pub fn set(key: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
        Self { key: key.into(), value_type, op: ChangeOp::Set(value.into()) }
    }

    pub fn tombstone(key: impl Into<String>, value_type: ValueType) -> Self {
        Self { key: key.into(), value_type, op: ChangeOp::Tombstone }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.op, ChangeOp::Tombstone)
    }
}

/// Unbounded FIFO of pending changes.
pub struct PendingChangeQueue {
    changes: Mutex<VecDeque<PendingChange>>,
    /// Total number of changes pushed since open
    total_enqueued: AtomicU64,
}

impl PendingChangeQueue {
    pub fn new() -> Self {
        Self {
            changes: Mutex::new(VecDeque::new()),
            total_enqueued: AtomicU64::new(0),
        }
    }

    /// Append a change. Never blocks on I/O.
    pub fn push(&self, change: PendingChange) {
        self.changes.lock().push_back(change);
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take every queued change in FIFO order, leaving the queue empty.
    pub fn drain(&self) -> Vec<PendingChange> {
        let mut changes = self.changes.lock();
        std::mem::take(&mut *changes).into()
    }

    /// Discard everything queued. Returns how many changes were dropped.
    pub fn clear(&self) -> usize {
        let mut changes = self.changes.lock();
        let dropped = changes.len();
        changes.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }

    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }
}

impl Default for PendingChangeQueue {
    fn default() -> Self { Self::new() }
}
