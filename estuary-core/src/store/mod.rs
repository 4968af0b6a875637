//! External Store Bridge
//!
//! This module implements the shared machinery every Estuary store is built
//! from: a listener set for change notification, a snapshot cell holding the
//! latest externally-observable value, and the bridge that ties both to a
//! source adapter with reference-counted attach/detach.
//!
//! # Concepts
//!
//! ## Snapshots
//!
//! A snapshot is the single current value of a store, read synchronously.
//! Before a source has produced anything the snapshot is the unready
//! sentinel; it never fails. Snapshots are `Arc`-backed, so two reads with
//! no intervening write return pointer-equal values and consumers can detect
//! change by identity alone.
//!
//! ## Listeners
//!
//! Listeners are zero-argument callbacks notified synchronously, in
//! registration order, after every snapshot write. Notification carries no
//! payload: a notified consumer re-reads the snapshot.
//!
//! ## The bridge
//!
//! [`ExternalStore`] converts an [`EventSource`] into a
//! `(subscribe, get_snapshot)` pair. The source is attached when the first
//! listener subscribes and detached (with the cell reset to unready) when
//! the last one unsubscribes, so an idle store holds no platform resources.

mod bridge;
mod listeners;
mod snapshot;

pub use bridge::{EventSource, ExternalStore, Publisher, Subscription};
pub use listeners::{ListenerGuard, ListenerId, ListenerSet};
pub use snapshot::{Snapshot, SnapshotCell};
