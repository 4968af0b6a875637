//! Listener Set
//!
//! The notification hub shared by every store: an insertion-ordered set of
//! zero-argument callbacks with O(1) fan-out on change.
//!
//! # Invariants
//!
//! - A callback is present exactly once per active registration.
//! - Removing an absent listener is a no-op.
//! - `notify_all` runs listeners synchronously, in registration order.
//!
//! Listeners must not insert into or remove from the set they are being
//! notified from; all mutation happens between notification turns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use smallvec::SmallVec;

/// Unique identifier for a registered listener.
///
/// Uses an atomic counter to ensure uniqueness across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

type Listener = Box<dyn Fn() + Send + Sync>;

/// An insertion-ordered set of notification callbacks.
///
/// Cloning a `ListenerSet` creates a new handle to the same underlying set.
/// Most stores hold one or two listeners, so entries live inline.
pub struct ListenerSet {
    entries: Arc<RwLock<SmallVec<[(ListenerId, Listener); 2]>>>,
}

impl ListenerSet {
    /// Create an empty listener set.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(SmallVec::new())),
        }
    }

    /// Register a callback, returning the ID that removes it later.
    pub fn insert<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.entries
            .write()
            .expect("listener lock poisoned")
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a callback. Removing an ID that is not present is a no-op.
    pub fn remove(&self, id: ListenerId) {
        self.entries
            .write()
            .expect("listener lock poisoned")
            .retain(|(entry_id, _)| *entry_id != id);
    }

    /// Notify every listener, in registration order.
    pub fn notify_all(&self) {
        let entries = self.entries.read().expect("listener lock poisoned");
        for (_, listener) in entries.iter() {
            listener();
        }
    }

    /// Get the number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.read().expect("listener lock poisoned").len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for ListenerSet {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping this guard removes the listener from its set.
#[derive(Debug)]
pub struct ListenerGuard {
    set: ListenerSet,
    id: ListenerId,
}

impl ListenerGuard {
    /// Create a guard for a listener already registered in `set`.
    pub fn new(set: ListenerSet, id: ListenerId) -> Self {
        Self { set, id }
    }

    /// Get the guarded listener's ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.set.remove(self.id);
    }
}
