//! Event-based Source Adapter
//!
//! Bridges a global event emitter with a synchronously readable current
//! state — the visibility / orientation / media-query pattern. On attach the
//! adapter publishes the current state immediately, so a subscriber sees an
//! accurate snapshot without waiting for the next event; afterwards every
//! event triggers a fresh read and publish.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::{EventSource, Publisher};

/// A global emitter capability with a readable current state.
pub trait EmitterBackend: Send + Sync + 'static {
    /// The state the emitter reports.
    type State: Send + Sync + 'static;

    /// Registration handle returned by `listen`.
    type Guard: Send + Sync + 'static;

    /// Read the current state, synchronously.
    fn read(&self) -> Self::State;

    /// Register an event listener. The event carries no payload; the
    /// adapter re-reads the state on each notification.
    fn listen(&self, on_event: Box<dyn Fn() + Send + Sync>) -> Self::Guard;

    /// Remove a previously registered listener.
    fn unlisten(&self, guard: Self::Guard);
}

/// [`EventSource`] over an [`EmitterBackend`].
pub struct EmitterSource<B: EmitterBackend> {
    backend: Arc<B>,
    guard: Mutex<Option<B::Guard>>,
}

impl<B: EmitterBackend> EmitterSource<B> {
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Build from an already shared backend.
    pub fn from_arc(backend: Arc<B>) -> Self {
        Self {
            backend,
            guard: Mutex::new(None),
        }
    }
}

impl<B: EmitterBackend> EventSource for EmitterSource<B> {
    type Item = B::State;

    fn attach(&self, publisher: Publisher<B::State>) {
        // Publish current state up front, not just future changes.
        publisher.publish(self.backend.read());

        let backend = Arc::clone(&self.backend);
        let guard = self.backend.listen(Box::new(move || {
            publisher.publish(backend.read());
        }));
        *self.guard.lock() = Some(guard);
    }

    fn detach(&self) {
        if let Some(guard) = self.guard.lock().take() {
            self.backend.unlisten(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExternalStore;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::RwLock;

    /// Fake emitter whose "state" is a settable integer.
    struct FakeEmitter {
        state: RwLock<i32>,
        listener: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
        unlistened: AtomicI32,
    }

    impl FakeEmitter {
        fn new(initial: i32) -> Arc<Self> {
            Arc::new(Self {
                state: RwLock::new(initial),
                listener: Mutex::new(None),
                unlistened: AtomicI32::new(0),
            })
        }

        fn change(&self, state: i32) {
            *self.state.write().unwrap() = state;
            if let Some(listener) = self.listener.lock().as_ref() {
                listener();
            }
        }
    }

    impl EmitterBackend for FakeEmitter {
        type State = i32;
        type Guard = ();

        fn read(&self) -> i32 {
            *self.state.read().unwrap()
        }

        fn listen(&self, on_event: Box<dyn Fn() + Send + Sync>) -> Self::Guard {
            *self.listener.lock() = Some(on_event);
        }

        fn unlisten(&self, _guard: Self::Guard) {
            self.unlistened.fetch_add(1, Ordering::SeqCst);
            self.listener.lock().take();
        }
    }

    #[test]
    fn attach_publishes_current_state_immediately() {
        let backend = FakeEmitter::new(41);
        let store = ExternalStore::new(EmitterSource::from_arc(backend));

        let notified = Arc::new(AtomicI32::new(0));
        let notified_clone = notified.clone();
        let _sub = store.subscribe(move || {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        // The new subscriber was notified of the initial read.
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_snapshot().value(), Some(&41));
    }

    #[test]
    fn events_republish_fresh_state() {
        let backend = FakeEmitter::new(0);
        let store = ExternalStore::new(EmitterSource::from_arc(backend.clone()));
        let _sub = store.subscribe(|| {});

        backend.change(1);
        assert_eq!(store.get_snapshot().value(), Some(&1));

        backend.change(2);
        assert_eq!(store.get_snapshot().value(), Some(&2));
    }

    #[test]
    fn detach_removes_listener_and_resets() {
        let backend = FakeEmitter::new(0);
        let store = ExternalStore::new(EmitterSource::from_arc(backend.clone()));

        let sub = store.subscribe(|| {});
        drop(sub);

        assert_eq!(backend.unlistened.load(Ordering::SeqCst), 1);
        assert!(!store.get_snapshot().is_ready());

        // A change while detached reaches nobody.
        backend.change(9);
        assert!(!store.get_snapshot().is_ready());
    }
}
