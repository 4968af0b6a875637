//! Snapshot Cell
//!
//! A single mutable slot holding the latest externally-observable value of a
//! store, plus the "unready" sentinel used before a source has produced
//! anything.
//!
//! # How Snapshots Work
//!
//! 1. The cell starts unready (or ready, for stores that have a meaningful
//!    initial value such as the timing controllers).
//!
//! 2. A source adapter or timing controller publishes values into the cell.
//!    Readers never observe a partially-constructed value: each publish
//!    stores one fully-built `Arc`.
//!
//! 3. When the last subscriber detaches, the cell is reset to unready so a
//!    later re-subscription starts from "not ready" rather than stale data.
//!
//! # Identity
//!
//! Ready snapshots share the published `Arc`, so two `get` calls with no
//! intervening publish return pointer-equal values. Consumers that diff by
//! identity (the common rendering-layer pattern) never see a spurious
//! change.

use std::sync::{Arc, RwLock};

/// The current value of a store, or the unready sentinel.
#[derive(Debug)]
pub enum Snapshot<T> {
    /// No value has been published since the cell was created or last reset.
    Unready,

    /// The latest published value.
    Ready(Arc<T>),
}

impl<T> Snapshot<T> {
    /// Check whether a value has been published.
    pub fn is_ready(&self) -> bool {
        matches!(self, Snapshot::Ready(_))
    }

    /// Get the published value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Snapshot::Unready => None,
            Snapshot::Ready(value) => Some(value),
        }
    }

    /// Unwrap into the published `Arc`, if any.
    pub fn into_ready(self) -> Option<Arc<T>> {
        match self {
            Snapshot::Unready => None,
            Snapshot::Ready(value) => Some(value),
        }
    }

    /// Identity comparison: both unready, or both sharing one published value.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Snapshot::Unready, Snapshot::Unready) => true,
            (Snapshot::Ready(a), Snapshot::Ready(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        match self {
            Snapshot::Unready => Snapshot::Unready,
            Snapshot::Ready(value) => Snapshot::Ready(Arc::clone(value)),
        }
    }
}

/// The slot a store's snapshot lives in.
///
/// Written only by the store's source adapter or timing controller; read by
/// any number of consumers. Cloning a `SnapshotCell` creates a new handle to
/// the same slot.
pub struct SnapshotCell<T> {
    slot: Arc<RwLock<Snapshot<T>>>,
}

impl<T> SnapshotCell<T> {
    /// Create a cell in the unready state.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Snapshot::Unready)),
        }
    }

    /// Create a cell already holding a value.
    pub fn ready(initial: T) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Snapshot::Ready(Arc::new(initial)))),
        }
    }

    /// Publish a new value into the cell.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.write().expect("snapshot lock poisoned");
        *slot = Snapshot::Ready(Arc::new(value));
    }

    /// Reset the cell to the unready state.
    pub fn reset(&self) {
        let mut slot = self.slot.write().expect("snapshot lock poisoned");
        *slot = Snapshot::Unready;
    }

    /// Read the current snapshot. Never fails; an untouched cell returns
    /// the unready sentinel.
    pub fn get(&self) -> Snapshot<T> {
        self.slot.read().expect("snapshot lock poisoned").clone()
    }

    /// Check whether the cell currently holds a value.
    pub fn is_ready(&self) -> bool {
        self.slot
            .read()
            .expect("snapshot lock poisoned")
            .is_ready()
    }
}

impl<T> Clone for SnapshotCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell").field("current", &self.get()).finish()
    }
}
