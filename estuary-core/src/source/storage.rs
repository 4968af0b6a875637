//! Storage Source Adapter
//!
//! A key-filtered selector over a string-keyed storage capability with
//! cross-context change notification, plus the matching writer.
//!
//! # How It Works
//!
//! 1. On attach the adapter reads the key, decodes it (JSON via serde), and
//!    publishes the result — the configured default when the key is absent.
//!
//! 2. Every change notification whose key matches republishes the decoded
//!    new value; other keys are ignored.
//!
//! 3. [`StorageWriter`] encodes values back into the store. Backends notify
//!    their own watchers on `set`/`remove`, so a writer and a selector over
//!    the same backend stay in sync within one process.
//!
//! Decode failures are a platform-data problem, not caller misuse: they are
//! logged and the default published instead. Encode failures on the writer
//! are caller misuse and propagate as [`StoreError`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::store::{EventSource, ListenerId, Publisher};

/// A change notification from a storage backend.
#[derive(Debug, Clone)]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,
    /// The new raw value, or `None` when the key was removed.
    pub new_value: Option<String>,
}

/// A string-keyed storage capability with change notification.
///
/// `set` and `remove` must notify watchers registered in the same process;
/// this stands in for the cross-context change event a platform storage
/// layer emits.
pub trait StorageBackend: Send + Sync + 'static {
    /// Registration handle returned by `watch`.
    type Guard: Send + Sync + 'static;

    /// Read the raw value under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a raw value under `key` and notify watchers.
    fn set(&self, key: &str, value: &str);

    /// Remove `key` and notify watchers.
    fn remove(&self, key: &str);

    /// Register a change watcher.
    fn watch(&self, on_change: Box<dyn Fn(StorageEvent) + Send + Sync>) -> Self::Guard;

    /// Remove a previously registered watcher.
    fn unwatch(&self, guard: Self::Guard);
}

fn decode_value<T>(key: &str, raw: Option<&str>, default: &T) -> T
where
    T: Clone + DeserializeOwned,
{
    match raw {
        None => default.clone(),
        Some(text) => match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "stored value failed to decode, using default");
                default.clone()
            }
        },
    }
}

/// [`EventSource`] selecting one key out of a [`StorageBackend`].
pub struct StorageSource<B: StorageBackend, T> {
    backend: Arc<B>,
    key: String,
    default: T,
    guard: Mutex<Option<B::Guard>>,
}

impl<B, T> StorageSource<B, T>
where
    B: StorageBackend,
    T: Clone + Send + Sync + DeserializeOwned + 'static,
{
    /// Create a selector for `key`, publishing `default` while the key is
    /// absent or undecodable.
    pub fn new(backend: Arc<B>, key: impl Into<String>, default: T) -> Self {
        Self {
            backend,
            key: key.into(),
            default,
            guard: Mutex::new(None),
        }
    }
}

impl<B, T> EventSource for StorageSource<B, T>
where
    B: StorageBackend,
    T: Clone + Send + Sync + DeserializeOwned + 'static,
{
    type Item = T;

    fn attach(&self, publisher: Publisher<T>) {
        let current = self.backend.get(&self.key);
        publisher.publish(decode_value(&self.key, current.as_deref(), &self.default));

        let key = self.key.clone();
        let default = self.default.clone();
        let guard = self.backend.watch(Box::new(move |event| {
            if event.key != key {
                return;
            }
            publisher.publish(decode_value(&key, event.new_value.as_deref(), &default));
        }));
        *self.guard.lock() = Some(guard);
    }

    fn detach(&self) {
        if let Some(guard) = self.guard.lock().take() {
            self.backend.unwatch(guard);
        }
    }
}

/// Writes encoded values into one key of a [`StorageBackend`].
pub struct StorageWriter<B: StorageBackend> {
    backend: Arc<B>,
    key: String,
}

impl<B: StorageBackend> StorageWriter<B> {
    pub fn new(backend: Arc<B>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Encode `value` and store it, notifying watchers.
    pub fn set<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        self.backend.set(&self.key, &text);
        Ok(())
    }

    /// Remove the key, notifying watchers.
    pub fn remove(&self) {
        self.backend.remove(&self.key);
    }
}

type Watcher = Box<dyn Fn(StorageEvent) + Send + Sync>;

/// In-process [`StorageBackend`] for tests and hosts without a platform
/// storage layer.
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    watchers: RwLock<Vec<(ListenerId, Watcher)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            watchers: RwLock::new(Vec::new()),
        }
    }

    fn notify(&self, event: StorageEvent) {
        let watchers = self.watchers.read().expect("watcher lock poisoned");
        for (_, watcher) in watchers.iter() {
            watcher(event.clone());
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    type Guard = ListenerId;

    fn get(&self, key: &str) -> Option<String> {
        self.items.read().expect("item lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.items
            .write()
            .expect("item lock poisoned")
            .insert(key.to_owned(), value.to_owned());
        self.notify(StorageEvent {
            key: key.to_owned(),
            new_value: Some(value.to_owned()),
        });
    }

    fn remove(&self, key: &str) {
        self.items.write().expect("item lock poisoned").remove(key);
        self.notify(StorageEvent {
            key: key.to_owned(),
            new_value: None,
        });
    }

    fn watch(&self, on_change: Box<dyn Fn(StorageEvent) + Send + Sync>) -> ListenerId {
        let id = ListenerId::new();
        self.watchers
            .write()
            .expect("watcher lock poisoned")
            .push((id, on_change));
        id
    }

    fn unwatch(&self, guard: ListenerId) {
        self.watchers
            .write()
            .expect("watcher lock poisoned")
            .retain(|(id, _)| *id != guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExternalStore;

    fn selector_store(
        backend: &Arc<MemoryStorage>,
        key: &str,
        default: i32,
    ) -> ExternalStore<StorageSource<MemoryStorage, i32>> {
        ExternalStore::new(StorageSource::new(Arc::clone(backend), key, default))
    }

    #[test]
    fn missing_key_publishes_default() {
        let backend = Arc::new(MemoryStorage::new());
        let store = selector_store(&backend, "counter", -1);

        let _sub = store.subscribe(|| {});
        assert_eq!(store.get_snapshot().value(), Some(&-1));
    }

    #[test]
    fn existing_key_is_decoded_on_attach() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set("counter", "42");

        let store = selector_store(&backend, "counter", 0);
        let _sub = store.subscribe(|| {});
        assert_eq!(store.get_snapshot().value(), Some(&42));
    }

    #[test]
    fn writer_updates_reach_selector() {
        let backend = Arc::new(MemoryStorage::new());
        let store = selector_store(&backend, "counter", 0);
        let writer = StorageWriter::new(Arc::clone(&backend), "counter");

        let _sub = store.subscribe(|| {});
        writer.set(&7).unwrap();
        assert_eq!(store.get_snapshot().value(), Some(&7));

        writer.remove();
        assert_eq!(store.get_snapshot().value(), Some(&0));
    }

    #[test]
    fn other_keys_are_ignored() {
        let backend = Arc::new(MemoryStorage::new());
        let store = selector_store(&backend, "counter", 0);

        let _sub = store.subscribe(|| {});
        backend.set("unrelated", "99");
        assert_eq!(store.get_snapshot().value(), Some(&0));
    }

    #[test]
    fn undecodable_value_falls_back_to_default() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set("counter", "not json");

        let store = selector_store(&backend, "counter", 5);
        let _sub = store.subscribe(|| {});
        assert_eq!(store.get_snapshot().value(), Some(&5));
    }

    #[test]
    fn detach_stops_watching_and_resets() {
        let backend = Arc::new(MemoryStorage::new());
        let store = selector_store(&backend, "counter", 0);

        let sub = store.subscribe(|| {});
        backend.set("counter", "1");
        assert_eq!(store.get_snapshot().value(), Some(&1));

        drop(sub);
        assert!(!store.get_snapshot().is_ready());

        backend.set("counter", "2");
        assert!(!store.get_snapshot().is_ready());
    }

    #[test]
    fn structs_round_trip_through_the_codec() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Settings {
            theme: String,
            scale: u8,
        }

        let backend = Arc::new(MemoryStorage::new());
        let default = Settings {
            theme: "light".into(),
            scale: 1,
        };
        let store = ExternalStore::new(StorageSource::new(
            Arc::clone(&backend),
            "settings",
            default,
        ));
        let writer = StorageWriter::new(Arc::clone(&backend), "settings");

        let _sub = store.subscribe(|| {});
        let updated = Settings {
            theme: "dark".into(),
            scale: 2,
        };
        writer.set(&updated).unwrap();
        assert_eq!(store.get_snapshot().value(), Some(&updated));
    }
}
