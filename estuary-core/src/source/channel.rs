//! Channel Source Adapter
//!
//! Receiver and sender ends of a named broadcast channel shared through a
//! [`ChannelRegistry`]. The receiver is an [`EventSource`]: attaching
//! acquires the channel and registers a message listener, detaching removes
//! the listener and releases the channel reference. Payloads are opaque and
//! passed through unmodified.
//!
//! Senders acquire the shared channel once at construction and do not hold a
//! listener count; a channel kept alive only by senders is released as soon
//! as its last receiver detaches.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::registry::{Channel, ChannelRegistry};
use crate::store::{EventSource, ListenerId, Publisher};

/// Receiving [`EventSource`] over one named channel.
pub struct ChannelSource<M> {
    registry: Arc<ChannelRegistry<M>>,
    name: String,
    listener: Mutex<Option<ListenerId>>,
}

impl<M: Clone + Send + Sync + 'static> ChannelSource<M> {
    /// Create a receiver for `name` against the given registry.
    ///
    /// Fails fast on an empty channel name.
    pub fn new(
        registry: Arc<ChannelRegistry<M>>,
        name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::EmptyChannelName);
        }
        Ok(Self {
            registry,
            name,
            listener: Mutex::new(None),
        })
    }
}

impl<M: Clone + Send + Sync + 'static> EventSource for ChannelSource<M> {
    type Item = M;

    fn attach(&self, publisher: Publisher<M>) {
        self.registry.acquire(&self.name);
        let id = self
            .registry
            .add_listener(&self.name, move |message: &M| {
                publisher.publish(message.clone());
            });
        *self.listener.lock() = id;
    }

    fn detach(&self) {
        if let Some(id) = self.listener.lock().take() {
            self.registry.remove_listener(&self.name, id);
        }
    }
}

/// Sending end of a named channel.
pub struct ChannelSender<M> {
    channel: Arc<Channel<M>>,
}

impl<M: Clone + Send + Sync + 'static> ChannelSender<M> {
    /// Acquire the shared channel for `name`.
    ///
    /// Fails fast on an empty channel name.
    pub fn new(registry: &ChannelRegistry<M>, name: &str) -> Result<Self, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyChannelName);
        }
        Ok(Self {
            channel: registry.acquire(name),
        })
    }

    /// Post a message to every current listener of the channel.
    pub fn send(&self, message: M) {
        self.channel.post(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExternalStore;

    fn receiver(
        registry: &Arc<ChannelRegistry<String>>,
        name: &str,
    ) -> ExternalStore<ChannelSource<String>> {
        ExternalStore::new(ChannelSource::new(Arc::clone(registry), name).unwrap())
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry: Arc<ChannelRegistry<String>> = Arc::new(ChannelRegistry::new());
        assert!(matches!(
            ChannelSource::new(Arc::clone(&registry), ""),
            Err(StoreError::EmptyChannelName)
        ));
        assert!(matches!(
            ChannelSender::new(&registry, ""),
            Err(StoreError::EmptyChannelName)
        ));
    }

    #[test]
    fn messages_flow_from_sender_to_receiver() {
        let registry = Arc::new(ChannelRegistry::new());
        let store = receiver(&registry, "updates");
        let sender = ChannelSender::new(&registry, "updates").unwrap();

        let _sub = store.subscribe(|| {});
        sender.send("hello".to_owned());

        assert_eq!(store.get_snapshot().value(), Some(&"hello".to_owned()));
    }

    #[test]
    fn receivers_share_one_channel() {
        let registry = Arc::new(ChannelRegistry::new());
        let store_a = receiver(&registry, "updates");
        let store_b = receiver(&registry, "updates");

        let _sub_a = store_a.subscribe(|| {});
        let _sub_b = store_b.subscribe(|| {});
        assert_eq!(registry.len(), 1);

        let sender = ChannelSender::new(&registry, "updates").unwrap();
        sender.send("ping".to_owned());

        assert_eq!(store_a.get_snapshot().value(), Some(&"ping".to_owned()));
        assert_eq!(store_b.get_snapshot().value(), Some(&"ping".to_owned()));
    }

    #[test]
    fn releasing_second_receiver_closes_channel() {
        let registry = Arc::new(ChannelRegistry::new());
        let store_a = receiver(&registry, "updates");
        let store_b = receiver(&registry, "updates");

        let sub_a = store_a.subscribe(|| {});
        let sub_b = store_b.subscribe(|| {});

        drop(sub_a);
        assert!(registry.contains("updates"));

        drop(sub_b);
        assert!(!registry.contains("updates"));
        assert!(registry.is_empty());
    }

    #[test]
    fn send_after_all_receivers_left_is_dropped() {
        let registry = Arc::new(ChannelRegistry::new());
        let store = receiver(&registry, "updates");
        let sender = ChannelSender::new(&registry, "updates").unwrap();

        let sub = store.subscribe(|| {});
        drop(sub);

        // The sender still holds the old channel handle; the post goes
        // nowhere and nothing panics.
        sender.send("void".to_owned());
        assert!(!store.get_snapshot().is_ready());
    }
}
