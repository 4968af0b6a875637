//! Observer-based Source Adapter
//!
//! Bridges a platform observer capability (intersection, resize, mutation,
//! and the like) into the snapshot/notify model. The observer is created
//! when the store attaches and disconnected when it detaches.
//!
//! Observation targets are nullable, mirroring how rendering layers hand out
//! element references that may not be mounted yet: attaching with an empty
//! target is a no-op, the store simply stays unready.

use std::sync::{Arc, RwLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::store::{EventSource, Publisher};

/// A platform observer capability.
///
/// `observe` binds an observer to a target and delivers entry batches to the
/// callback until `disconnect` is called on the returned handle.
pub trait ObserverBackend: Send + Sync + 'static {
    /// What the observer watches.
    type Target: Clone + Send + Sync + 'static;

    /// One observation record.
    type Entry: Send + Sync + 'static;

    /// The live observer bound to a target.
    type Handle: Send + Sync + 'static;

    /// Start observing `target`, delivering batches to `on_entries`.
    fn observe(
        &self,
        target: Self::Target,
        on_entries: Box<dyn Fn(Vec<Self::Entry>) + Send + Sync>,
    ) -> Self::Handle;

    /// Stop a previously created observer.
    fn disconnect(&self, handle: &Self::Handle);
}

/// A clonable, nullable reference to an observation target.
///
/// Stores share a `TargetRef` with whoever owns the target's lifecycle; the
/// owner fills it in once the target exists and clears it on teardown.
pub struct TargetRef<T> {
    slot: Arc<RwLock<Option<T>>>,
}

impl<T: Clone> TargetRef<T> {
    /// Create a reference already pointing at a target.
    pub fn new(target: T) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(target))),
        }
    }

    /// Create an empty reference.
    pub fn empty() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Point the reference at a target.
    pub fn set(&self, target: T) {
        *self.slot.write().expect("target lock poisoned") = Some(target);
    }

    /// Clear the reference.
    pub fn clear(&self) {
        *self.slot.write().expect("target lock poisoned") = None;
    }

    /// Get the current target, if any.
    pub fn get(&self) -> Option<T> {
        self.slot.read().expect("target lock poisoned").clone()
    }
}

impl<T> Clone for TargetRef<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// [`EventSource`] over an [`ObserverBackend`] and a target reference.
///
/// Publishes the first entry of every delivered batch.
pub struct ObserverSource<B: ObserverBackend> {
    backend: B,
    target: TargetRef<B::Target>,
    handle: Mutex<Option<B::Handle>>,
}

impl<B: ObserverBackend> ObserverSource<B> {
    /// Create a source observing whatever `target` points at when the store
    /// attaches.
    pub fn new(backend: B, target: TargetRef<B::Target>) -> Self {
        Self {
            backend,
            target,
            handle: Mutex::new(None),
        }
    }
}

impl<B: ObserverBackend> EventSource for ObserverSource<B> {
    type Item = B::Entry;

    fn attach(&self, publisher: Publisher<B::Entry>) {
        let Some(target) = self.target.get() else {
            // Unavailable capability: no observer, no error, cell stays unready.
            debug!("observer target absent at attach, skipping");
            return;
        };

        let handle = self.backend.observe(
            target,
            Box::new(move |entries| {
                if let Some(entry) = entries.into_iter().next() {
                    publisher.publish(entry);
                }
            }),
        );
        *self.handle.lock() = Some(handle);
    }

    fn detach(&self) {
        if let Some(handle) = self.handle.lock().take() {
            self.backend.disconnect(&handle);
        }
    }
}
