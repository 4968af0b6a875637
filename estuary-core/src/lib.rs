//! Estuary Core
//!
//! Reactive plumbing between push-based event sources and pull-based
//! consumers. It implements:
//!
//! - An external-store bridge: `subscribe` / `get_snapshot` over any
//!   push-based source, with attach-on-first-listener lifecycle
//! - Source adapters for observers, event emitters, key-value storage and
//!   named broadcast channels
//! - Debounce and throttle controllers driven by a pluggable timer
//! - A reference-counted channel registry shared by senders and receivers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: snapshot cells, listener sets and the [`store::ExternalStore`]
//!   bridge
//! - `source`: [`store::EventSource`] adapters over concrete backends
//! - `timing`: [`timing::DebouncedStore`], [`timing::ThrottledStore`] and
//!   the [`timing::TimerDriver`] boundary
//! - `registry`: named channels with create-on-first-use, close-on-last-use
//!   semantics
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use estuary_core::timing::{DebouncedStore, TokioTimerDriver};
//!
//! let driver = Arc::new(TokioTimerDriver::current());
//! let query = DebouncedStore::new(String::new(), Duration::from_millis(200), driver)?;
//!
//! let _sub = query.subscribe(|| println!("query changed"));
//!
//! // Rapid keystrokes; only the last survives the quiet period.
//! query.request("r".to_owned());
//! query.request("ru".to_owned());
//! query.request("rust".to_owned());
//! ```

pub mod error;
pub mod registry;
pub mod source;
pub mod store;
pub mod timing;

pub use error::StoreError;
