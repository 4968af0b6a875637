//! Timer Capability
//!
//! The platform timer boundary the timing controllers schedule against:
//! schedule-after-delay with an owned, idempotent cancellation token.
//!
//! # Cancellation
//!
//! Every `schedule` returns a [`TimerToken`]. Cancelling it is idempotent
//! and guarantees the callback never runs afterwards; controllers cancel or
//! clear the token exactly once on every exit path (normal fire, replace,
//! dispose).
//!
//! # Drivers
//!
//! [`ManualTimerDriver`] is a virtual clock: nothing fires until `advance`
//! is called, and due timers fire in deadline order with `now()` reporting
//! each timer's own deadline during its callback. [`TokioTimerDriver`]
//! schedules real sleeps on a tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// The work a timer runs when it fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// A monotonic clock plus one-shot timer scheduling.
pub trait TimerDriver: Send + Sync {
    /// Monotonic time since the driver's epoch.
    fn now(&self) -> Duration;

    /// Run `callback` once after `delay`, unless the returned token is
    /// cancelled first.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken;
}

/// Owned cancellation token for a scheduled timer.
///
/// Clones share the same cancellation state. `cancel` is idempotent; a
/// cancelled timer never runs its callback.
#[derive(Debug, Clone)]
pub struct TimerToken {
    cancelled: Arc<AtomicBool>,
}

impl TimerToken {
    /// Create a fresh, uncancelled token. Driver implementations clone it
    /// into their pending timer and check it before firing.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the timer. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TimerToken {
    fn default() -> Self {
        Self::new()
    }
}

struct ManualTimer {
    deadline: Duration,
    seq: u64,
    token: TimerToken,
    callback: Option<TimerCallback>,
}

struct ManualQueue {
    now: Duration,
    next_seq: u64,
    timers: Vec<ManualTimer>,
}

/// Virtual-clock [`TimerDriver`] for tests and deterministic hosts.
///
/// Cloning shares the clock and queue.
pub struct ManualTimerDriver {
    inner: Arc<Mutex<ManualQueue>>,
}

impl ManualTimerDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualQueue {
                now: Duration::ZERO,
                next_seq: 0,
                timers: Vec::new(),
            })),
        }
    }

    /// Move virtual time forward, firing every due timer in (deadline,
    /// schedule) order. Timers scheduled by a firing callback that fall
    /// inside the window fire within the same call.
    pub fn advance(&self, by: Duration) {
        let target = self.inner.lock().now + by;

        loop {
            // Take the next due timer under the lock, run it outside so the
            // callback can schedule or cancel freely.
            let next = {
                let mut queue = self.inner.lock();
                queue.timers.retain(|timer| !timer.token.is_cancelled());

                let due = queue
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= target)
                    .min_by_key(|(_, timer)| (timer.deadline, timer.seq))
                    .map(|(index, _)| index);

                match due {
                    Some(index) => {
                        let mut timer = queue.timers.remove(index);
                        queue.now = queue.now.max(timer.deadline);
                        timer.callback.take()
                    }
                    None => {
                        queue.now = target;
                        None
                    }
                }
            };

            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Get the number of scheduled, uncancelled timers.
    pub fn pending_timers(&self) -> usize {
        let queue = self.inner.lock();
        queue
            .timers
            .iter()
            .filter(|timer| !timer.token.is_cancelled())
            .count()
    }
}

impl Clone for ManualTimerDriver {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for ManualTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for ManualTimerDriver {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let mut queue = self.inner.lock();
        let token = TimerToken::new();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        let deadline = queue.now + delay;
        queue.timers.push(ManualTimer {
            deadline,
            seq,
            token: token.clone(),
            callback: Some(callback),
        });
        token
    }
}

/// [`TimerDriver`] backed by a tokio runtime.
pub struct TokioTimerDriver {
    handle: tokio::runtime::Handle,
    epoch: Instant,
}

impl TokioTimerDriver {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            epoch: Instant::now(),
        }
    }

    /// Build from the runtime the caller is currently on.
    ///
    /// Panics outside a tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl TimerDriver for TokioTimerDriver {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let token = TimerToken::new();
        let task_token = token.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !task_token.is_cancelled() {
                callback();
            }
        });
        token
    }
}
