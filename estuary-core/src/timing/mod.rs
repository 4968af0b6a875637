//! Timing Controllers
//!
//! Timer-driven state machines that sit in front of a snapshot cell and
//! decide *when* an incoming value becomes the new snapshot:
//!
//! - [`DebouncedStore`] commits a value only after a quiet period with no
//!   newer request (trailing edge only; the very first request is a silent
//!   baseline).
//! - [`ThrottledStore`] commits the first request immediately and spaces
//!   later commits at least one interval apart, coalescing the requests in
//!   between to the latest one (leading edge immediate, trailing edge
//!   coalesced).
//!
//! Both are driven through a [`TimerDriver`]: real hosts use
//! [`TokioTimerDriver`], tests and deterministic hosts use
//! [`ManualTimerDriver`] and advance virtual time explicitly.
//!
//! [`DebouncedCallback`] and [`ThrottledCallback`] apply the same machines
//! to an action instead of a value store.

mod debounce;
mod throttle;
mod timer;

pub use debounce::{Debounced, DebouncedCallback, DebouncedStore};
pub use throttle::{ThrottledCallback, ThrottledStore};
pub use timer::{ManualTimerDriver, TimerCallback, TimerDriver, TimerToken, TokioTimerDriver};
