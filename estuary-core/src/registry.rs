//! Resource Registry
//!
//! Shared ownership for named broadcast channels: one underlying channel per
//! name, reference-counted by message listeners.
//!
//! # How It Works
//!
//! 1. `acquire` creates the channel on first use and returns the existing
//!    one afterwards — idempotent per name.
//!
//! 2. Every registered message listener bumps the entry's listener count.
//!
//! 3. Removing a listener decrements the count; at exactly zero the channel
//!    is closed and the entry evicted. The registry never holds a dangling
//!    entry with zero listeners, and never destroys a channel twice: a
//!    removal that matches no registered listener does not decrement.
//!
//! The registry is an explicitly owned object. Construct one per
//! application context and hand it to the adapters that need it; there is no
//! process-wide singleton, so tests get isolated instances for free.
//!
//! Message payloads are opaque to the registry and passed through
//! unmodified; serialization, if any, is the caller's concern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::store::ListenerId;

type MessageListener<M> = Box<dyn Fn(&M) + Send + Sync>;

/// A named fan-out bus shared between all subscribers of one name.
pub struct Channel<M> {
    name: String,
    listeners: RwLock<Vec<(ListenerId, MessageListener<M>)>>,
    closed: AtomicBool,
}

impl<M: Clone + Send + Sync + 'static> Channel<M> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            listeners: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the channel's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver a message to every registered listener, in registration
    /// order. Posts to a closed channel are dropped.
    pub fn post(&self, message: M) {
        if self.closed.load(Ordering::SeqCst) {
            warn!(channel = %self.name, "post on closed channel dropped");
            return;
        }
        let listeners = self.listeners.read().expect("channel listener lock poisoned");
        for (_, listener) in listeners.iter() {
            listener(&message);
        }
    }

    /// Check whether the channel has been closed by its registry.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn add_listener(&self, listener: MessageListener<M>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .expect("channel listener lock poisoned")
            .push((id, listener));
        id
    }

    /// Returns whether a listener was actually removed.
    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .expect("channel listener lock poisoned");
        let before = listeners.len();
        listeners.retain(|(entry_id, _)| *entry_id != id);
        listeners.len() != before
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners
            .write()
            .expect("channel listener lock poisoned")
            .clear();
    }
}

struct ChannelEntry<M> {
    channel: Arc<Channel<M>>,
    listener_count: usize,
}

/// Process-context map from channel name to its shared channel and listener
/// count.
pub struct ChannelRegistry<M> {
    entries: DashMap<String, ChannelEntry<M>>,
}

impl<M: Clone + Send + Sync + 'static> ChannelRegistry<M> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the channel for `name`, creating it on first use.
    pub fn acquire(&self, name: &str) -> Arc<Channel<M>> {
        let entry = self.entries.entry(name.to_owned()).or_insert_with(|| {
            debug!(channel = name, "creating shared channel");
            ChannelEntry {
                channel: Arc::new(Channel::new(name)),
                listener_count: 0,
            }
        });
        Arc::clone(&entry.channel)
    }

    /// Register a message listener on an existing channel.
    ///
    /// Returns `None` (and registers nothing) when no channel of that name
    /// has been acquired.
    pub fn add_listener<F>(&self, name: &str, listener: F) -> Option<ListenerId>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let mut entry = self.entries.get_mut(name)?;
        let id = entry.channel.add_listener(Box::new(listener));
        entry.listener_count += 1;
        Some(id)
    }

    /// Remove a message listener, releasing the channel when the count
    /// reaches exactly zero.
    pub fn remove_listener(&self, name: &str, id: ListenerId) {
        let mut release = false;
        if let Some(mut entry) = self.entries.get_mut(name) {
            // Only a removal that matched a registered listener decrements,
            // so double-release cannot drive the count below zero.
            if entry.channel.remove_listener(id) {
                entry.listener_count = entry.listener_count.saturating_sub(1);
            }
            release = entry.listener_count == 0;
        }

        if release {
            self.entries.remove_if(name, |_, entry| {
                if entry.listener_count == 0 {
                    debug!(channel = name, "last listener gone, closing shared channel");
                    entry.channel.close();
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Get the number of live channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the registry holds no channels.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether a channel of this name is currently live.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl<M: Clone + Send + Sync + 'static> Default for ChannelRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn acquire_is_idempotent_per_name() {
        let registry: ChannelRegistry<String> = ChannelRegistry::new();

        let first = registry.acquire("updates");
        let second = registry.acquire("updates");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        registry.acquire("other");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn listener_on_unknown_channel_is_refused() {
        let registry: ChannelRegistry<String> = ChannelRegistry::new();
        assert!(registry.add_listener("nope", |_| {}).is_none());
    }

    #[test]
    fn posts_fan_out_to_all_listeners() {
        let registry: ChannelRegistry<i32> = ChannelRegistry::new();
        let channel = registry.acquire("numbers");

        let sum = Arc::new(AtomicI32::new(0));
        for _ in 0..2 {
            let sum_clone = sum.clone();
            registry
                .add_listener("numbers", move |message: &i32| {
                    sum_clone.fetch_add(*message, Ordering::SeqCst);
                })
                .unwrap();
        }

        channel.post(10);
        assert_eq!(sum.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn channel_created_once_destroyed_once() {
        let registry: ChannelRegistry<i32> = ChannelRegistry::new();
        let channel = registry.acquire("shared");

        let id1 = registry.add_listener("shared", |_| {}).unwrap();
        let id2 = registry.add_listener("shared", |_| {}).unwrap();

        registry.remove_listener("shared", id1);
        assert!(registry.contains("shared"));
        assert!(!channel.is_closed());

        registry.remove_listener("shared", id2);
        assert!(!registry.contains("shared"));
        assert!(channel.is_closed());
    }

    #[test]
    fn double_release_does_not_double_decrement() {
        let registry: ChannelRegistry<i32> = ChannelRegistry::new();
        registry.acquire("shared");

        let id1 = registry.add_listener("shared", |_| {}).unwrap();
        let id2 = registry.add_listener("shared", |_| {}).unwrap();

        registry.remove_listener("shared", id1);
        registry.remove_listener("shared", id1);
        assert!(registry.contains("shared"));

        registry.remove_listener("shared", id2);
        assert!(!registry.contains("shared"));
    }

    #[test]
    fn post_after_close_is_dropped() {
        let registry: ChannelRegistry<i32> = ChannelRegistry::new();
        let channel = registry.acquire("shared");

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let id = registry
            .add_listener("shared", move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        registry.remove_listener("shared", id);

        channel.post(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reacquire_after_release_creates_fresh_channel() {
        let registry: ChannelRegistry<i32> = ChannelRegistry::new();
        let old = registry.acquire("shared");
        let id = registry.add_listener("shared", |_| {}).unwrap();
        registry.remove_listener("shared", id);

        let fresh = registry.acquire("shared");
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.is_closed());
    }
}
