//! External Store Bridge
//!
//! Converts an arbitrary push-based event source into the pull-based
//! `(subscribe, get_snapshot)` contract a rendering layer can poll.
//!
//! # How the Bridge Works
//!
//! 1. A consumer subscribes. If it is the first listener, the store attaches
//!    its [`EventSource`], handing it a [`Publisher`] for the store's cell.
//!
//! 2. External events arrive; the adapter publishes values through the
//!    publisher, which writes the snapshot cell and fans out notifications.
//!
//! 3. Notified consumers re-read the snapshot synchronously.
//!
//! 4. When the last subscription is dropped the source is detached and the
//!    cell reset to unready, so re-subscription never observes stale data.
//!
//! The listener is registered *before* the source attaches: adapters that
//! publish their current state synchronously during attach (the event-based
//! ones) reach the brand-new subscriber too.
//!
//! # Failure Policy
//!
//! Nothing here fails for "no listeners yet": `get_snapshot` before any
//! subscription returns the unready sentinel. Adapters never surface
//! platform errors as store failures; an unavailable capability just leaves
//! the cell unready.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::listeners::{ListenerId, ListenerSet};
use super::snapshot::{Snapshot, SnapshotCell};

/// Per-capability logic that bridges one external event source into the
/// snapshot/notify model.
///
/// `attach` is called when the first listener subscribes, `detach` when the
/// last one unsubscribes. Implementations use interior mutability to hold
/// whatever platform handle attach acquires.
pub trait EventSource: Send + Sync + 'static {
    /// The value this source publishes into the store.
    type Item: Send + Sync + 'static;

    /// Attach to the underlying capability and start publishing.
    fn attach(&self, publisher: Publisher<Self::Item>);

    /// Detach from the underlying capability and stop publishing.
    fn detach(&self);
}

/// Write handle a source adapter uses to update its store.
///
/// Publishing writes the snapshot cell, then notifies listeners in
/// registration order.
pub struct Publisher<T> {
    cell: SnapshotCell<T>,
    listeners: ListenerSet,
}

impl<T: Send + Sync + 'static> Publisher<T> {
    /// Publish a new snapshot and notify all listeners.
    pub fn publish(&self, value: T) {
        self.cell.publish(value);
        self.listeners.notify_all();
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

struct StoreInner<S: EventSource> {
    source: S,
    cell: SnapshotCell<S::Item>,
    listeners: ListenerSet,
    /// Serializes subscribe/unsubscribe transitions so first-attach and
    /// last-detach each happen exactly once.
    lifecycle: Mutex<()>,
}

/// A pull-based store over a push-based [`EventSource`].
///
/// Cloning an `ExternalStore` creates a new handle to the same store.
///
/// # Example
///
/// ```rust,ignore
/// let store = ExternalStore::new(EmitterSource::new(backend));
///
/// let subscription = store.subscribe(|| println!("changed"));
/// let current = store.get_snapshot();
///
/// drop(subscription); // last one out detaches the source
/// ```
pub struct ExternalStore<S: EventSource> {
    inner: Arc<StoreInner<S>>,
}

impl<S: EventSource> ExternalStore<S> {
    /// Create a store over the given source. Nothing is attached until the
    /// first subscription.
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source,
                cell: SnapshotCell::new(),
                listeners: ListenerSet::new(),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    /// Register a change listener.
    ///
    /// The first subscription attaches the source. Dropping the returned
    /// [`Subscription`] deregisters the listener and, if it was the last
    /// one, detaches the source and resets the snapshot to unready.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let _turn = self.inner.lifecycle.lock();

        let first = self.inner.listeners.is_empty();
        let id = self.inner.listeners.insert(listener);

        if first {
            debug!("first subscriber, attaching source");
            self.inner.source.attach(Publisher {
                cell: self.inner.cell.clone(),
                listeners: self.inner.listeners.clone(),
            });
        }

        Subscription {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Read the current snapshot. Synchronous and side-effect-free; before
    /// any subscription this is the unready sentinel.
    pub fn get_snapshot(&self) -> Snapshot<S::Item> {
        self.inner.cell.get()
    }

    /// The pre-attachment default handed out where no live snapshot can
    /// exist yet.
    pub fn server_snapshot(&self) -> Snapshot<S::Item> {
        Snapshot::Unready
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<S: EventSource> Clone for ExternalStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Handle to an active subscription.
///
/// Dropping it deregisters the listener; the last drop detaches the source
/// and resets the store to unready.
pub struct Subscription<S: EventSource> {
    inner: Arc<StoreInner<S>>,
    id: ListenerId,
}

impl<S: EventSource> Drop for Subscription<S> {
    fn drop(&mut self) {
        let _turn = self.inner.lifecycle.lock();

        self.inner.listeners.remove(self.id);
        if self.inner.listeners.is_empty() {
            debug!("last subscriber gone, detaching source");
            self.inner.source.detach();
            self.inner.cell.reset();
        }
    }
}
