//! Source Adapters
//!
//! Per-capability implementations of [`EventSource`](crate::store::EventSource),
//! one per class of external push-based capability:
//!
//! - [`ObserverSource`]: platform observers bound to a (possibly absent)
//!   target, e.g. intersection/resize/mutation observation.
//! - [`EmitterSource`]: global event emitters with a synchronously readable
//!   current state, e.g. visibility, orientation, media queries.
//! - [`StorageSource`] / [`StorageWriter`]: a string-keyed storage capability
//!   with cross-context change notification and a serde codec.
//! - [`ChannelSource`] / [`ChannelSender`]: named broadcast channels shared
//!   through a [`ChannelRegistry`](crate::registry::ChannelRegistry).
//!
//! The concrete platform bindings live behind small backend traits so hosts
//! (and tests) inject their own.

mod channel;
mod emitter;
mod observer;
mod storage;

pub use channel::{ChannelSender, ChannelSource};
pub use emitter::{EmitterBackend, EmitterSource};
pub use observer::{ObserverBackend, ObserverSource, TargetRef};
pub use storage::{MemoryStorage, StorageBackend, StorageEvent, StorageSource, StorageWriter};
