//! Error types for the Estuary core.
//!
//! Estuary deliberately keeps its failure surface small. Platform-level
//! problems (a missing observer target, an undecodable stored value, a post
//! to a channel that was already closed) are never surfaced as errors: the
//! affected store simply stays in, or falls back to, its default state.
//!
//! The only failures that propagate are caller misuse, and those fail fast
//! at construction or call time rather than inside an asynchronous callback.

use thiserror::Error;

/// Errors produced by store construction and writer operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A debounce quiet period or throttle interval of zero was configured.
    #[error("timing interval must be greater than zero")]
    ZeroInterval,

    /// An empty string was used as a shared channel name.
    #[error("channel name must not be empty")]
    EmptyChannelName,

    /// A value handed to a storage writer could not be encoded.
    #[error("failed to encode storage value: {0}")]
    Encode(#[from] serde_json::Error),
}
