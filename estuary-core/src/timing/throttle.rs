//! Throttle Controller
//!
//! Spaces commits at least one interval apart, measured from the last
//! commit — not from the first pending request.
//!
//! # State Machine
//!
//! Two states, `Settled` and `Cooldown`:
//!
//! 1. A request arriving when at least one interval has passed since the
//!    last commit (or when nothing has ever committed — the first request)
//!    commits immediately. Leading edge.
//!
//! 2. A request arriving inside the cooldown replaces any pending timer
//!    with one firing at `interval - elapsed`, carrying the latest value.
//!    Of N rapid requests inside one window only the first and the last
//!    ever commit. Trailing edge, coalesced.
//!
//! 3. Disposal cancels the pending timer; a value pending at disposal time
//!    is never committed. Timer callbacks re-check disposal and a
//!    generation counter before committing, so a fire racing disposal at
//!    task granularity mutates nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use parking_lot::Mutex;

use super::timer::{TimerDriver, TimerToken};
use crate::error::StoreError;
use crate::store::{ListenerGuard, ListenerSet, Snapshot, SnapshotCell};

/// A throttled value store.
///
/// Cloning shares state.
pub struct ThrottledStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: SnapshotCell<T>,
    listeners: ListenerSet,
    driver: Arc<dyn TimerDriver>,
    interval: Duration,
    /// Driver timestamp of the last commit; `None` until the first.
    last_commit: Arc<RwLock<Option<Duration>>>,
    disposed: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    timer: Arc<Mutex<Option<TimerToken>>>,
}

impl<T> ThrottledStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store holding `initial`.
    ///
    /// Fails fast on a zero interval.
    pub fn new(
        initial: T,
        interval: Duration,
        driver: Arc<dyn TimerDriver>,
    ) -> Result<Self, StoreError> {
        if interval.is_zero() {
            return Err(StoreError::ZeroInterval);
        }
        Ok(Self {
            cell: SnapshotCell::ready(initial),
            listeners: ListenerSet::new(),
            driver,
            interval,
            last_commit: Arc::new(RwLock::new(None)),
            disposed: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Arc::new(Mutex::new(None)),
        })
    }

    /// Ask for `value` to become the snapshot, now or at the end of the
    /// current cooldown.
    pub fn request(&self, value: T) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.clear_timer();

        let now = self.driver.now();
        let previous = *self.last_commit.read().expect("last_commit lock poisoned");

        // Saturated so a driver whose clock slips backwards cannot underflow.
        match previous.map(|committed_at| now.saturating_sub(committed_at)) {
            Some(elapsed) if elapsed < self.interval => {
                // Cooldown: coalesce onto a timer for the remainder.
                let remaining = self.interval - elapsed;
                let store = self.clone();
                let token = self.driver.schedule(
                    remaining,
                    Box::new(move || store.commit_pending(value, generation)),
                );
                *self.timer.lock() = Some(token);
            }
            _ => {
                // First request, or the cooldown has passed: leading commit.
                self.commit(value, now);
            }
        }
    }

    fn commit_pending(&self, value: T, generation: u64) {
        if self.disposed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        self.timer.lock().take();
        let now = self.driver.now();
        self.commit(value, now);
    }

    fn commit(&self, value: T, timestamp: Duration) {
        *self.last_commit.write().expect("last_commit lock poisoned") = Some(timestamp);
        self.cell.publish(value);
        self.listeners.notify_all();
    }

    /// Read the current snapshot. Reference-stable between commits.
    pub fn get_snapshot(&self) -> Arc<T> {
        match self.cell.get() {
            Snapshot::Ready(value) => value,
            Snapshot::Unready => unreachable!("timing cell is ready from construction"),
        }
    }

    /// Register a change listener.
    pub fn subscribe<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.listeners.insert(listener);
        ListenerGuard::new(self.listeners.clone(), id)
    }

    /// Cancel any pending commit and stop accepting requests. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_timer();
    }

    /// Check whether the store has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn clear_timer(&self) {
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }
    }
}

impl<T> Clone for ThrottledStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            listeners: self.listeners.clone(),
            driver: Arc::clone(&self.driver),
            interval: self.interval,
            last_commit: Arc::clone(&self.last_commit),
            disposed: Arc::clone(&self.disposed),
            generation: Arc::clone(&self.generation),
            timer: Arc::clone(&self.timer),
        }
    }
}

/// Throttles invocations of an action: the first call in a window runs
/// immediately, later calls coalesce into one trailing run with the latest
/// argument.
pub struct ThrottledCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    action: Arc<dyn Fn(A) + Send + Sync>,
    driver: Arc<dyn TimerDriver>,
    interval: Duration,
    last_run: Arc<RwLock<Option<Duration>>>,
    disposed: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    timer: Arc<Mutex<Option<TimerToken>>>,
}

impl<A> ThrottledCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Wrap `action`. Fails fast on a zero interval.
    pub fn new<F>(
        action: F,
        interval: Duration,
        driver: Arc<dyn TimerDriver>,
    ) -> Result<Self, StoreError>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(StoreError::ZeroInterval);
        }
        Ok(Self {
            action: Arc::new(action),
            driver,
            interval,
            last_run: Arc::new(RwLock::new(None)),
            disposed: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Arc::new(Mutex::new(None)),
        })
    }

    /// Run the action with `argument`, now or at the end of the current
    /// cooldown.
    pub fn call(&self, argument: A) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }

        let now = self.driver.now();
        let previous = *self.last_run.read().expect("last_run lock poisoned");

        match previous.map(|ran_at| now.saturating_sub(ran_at)) {
            Some(elapsed) if elapsed < self.interval => {
                let remaining = self.interval - elapsed;
                let callback = self.clone();
                let token = self.driver.schedule(
                    remaining,
                    Box::new(move || callback.fire(argument, generation)),
                );
                *self.timer.lock() = Some(token);
            }
            _ => {
                *self.last_run.write().expect("last_run lock poisoned") = Some(now);
                (self.action)(argument);
            }
        }
    }

    fn fire(&self, argument: A, generation: u64) {
        if self.disposed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        self.timer.lock().take();
        *self.last_run.write().expect("last_run lock poisoned") = Some(self.driver.now());
        (self.action)(argument);
    }

    /// Cancel any scheduled invocation and stop accepting calls. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }
    }
}

impl<A> Clone for ThrottledCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            action: Arc::clone(&self.action),
            driver: Arc::clone(&self.driver),
            interval: self.interval,
            last_run: Arc::clone(&self.last_run),
            disposed: Arc::clone(&self.disposed),
            generation: Arc::clone(&self.generation),
            timer: Arc::clone(&self.timer),
        }
    }
}
