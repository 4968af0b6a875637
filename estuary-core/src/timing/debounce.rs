//! Debounce Controller
//!
//! Commits a value only after a configured quiet period passes with no
//! newer request.
//!
//! # State Machine
//!
//! Two states, `Idle` and `Pending`:
//!
//! 1. The very first request after construction is a silent baseline: the
//!    committed value is replaced without notifying anyone. A freshly
//!    constructed debounced value starts already "settled" — there is no
//!    artificial initial transition.
//!
//! 2. Every later request cancels the outstanding timer, publishes a
//!    pending signal (committed value unchanged, pending flag set) and
//!    restarts the quiet-period timer. Requesting the currently committed
//!    value again still restarts the period: the controller tracks timing,
//!    not value novelty.
//!
//! 3. When the timer fires the pending value is committed and the pending
//!    flag cleared.
//!
//! 4. Disposal cancels the timer without committing. A disposed store never
//!    mutates its snapshot again: timer callbacks re-check both the
//!    disposal flag and a generation counter before touching anything, so
//!    even a fire racing disposal at task granularity commits nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::timer::{TimerDriver, TimerToken};
use crate::error::StoreError;
use crate::store::{ListenerGuard, ListenerSet, Snapshot, SnapshotCell};

/// A debounced value: the last committed value plus whether a newer request
/// is waiting out its quiet period.
///
/// Modeled as one tagged variant so the committed value and the pending
/// flag cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Debounced<T> {
    /// No request in flight; `value` is current.
    Settled(T),

    /// A newer value is waiting; `last` stays externally visible until it
    /// commits.
    Pending {
        /// The last committed value.
        last: T,
    },
}

impl<T> Debounced<T> {
    /// The externally visible (last committed) value.
    pub fn value(&self) -> &T {
        match self {
            Debounced::Settled(value) => value,
            Debounced::Pending { last } => last,
        }
    }

    /// Check whether a request is waiting out its quiet period.
    pub fn is_pending(&self) -> bool {
        matches!(self, Debounced::Pending { .. })
    }
}

/// A debounced value store.
///
/// Cloning shares state; the clone inside a timer callback is how commits
/// find their way back.
///
/// # Example
///
/// ```rust,ignore
/// let driver = Arc::new(ManualTimerDriver::new());
/// let store = DebouncedStore::new("", Duration::from_millis(200), driver.clone())?;
///
/// store.request("typed");      // baseline, silent
/// store.request("typed more"); // pending
/// driver.advance(Duration::from_millis(200));
/// assert_eq!(store.get_snapshot().value(), &"typed more");
/// ```
pub struct DebouncedStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: SnapshotCell<Debounced<T>>,
    listeners: ListenerSet,
    driver: Arc<dyn TimerDriver>,
    quiet_period: Duration,
    initialized: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    timer: Arc<Mutex<Option<TimerToken>>>,
}

impl<T> DebouncedStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store settled at `initial`.
    ///
    /// Fails fast on a zero quiet period.
    pub fn new(
        initial: T,
        quiet_period: Duration,
        driver: Arc<dyn TimerDriver>,
    ) -> Result<Self, StoreError> {
        if quiet_period.is_zero() {
            return Err(StoreError::ZeroInterval);
        }
        Ok(Self {
            cell: SnapshotCell::ready(Debounced::Settled(initial)),
            listeners: ListenerSet::new(),
            driver,
            quiet_period,
            initialized: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Arc::new(Mutex::new(None)),
        })
    }

    /// Ask for `value` to become the snapshot once the quiet period passes.
    pub fn request(&self, value: T) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if !self.initialized.swap(true, Ordering::SeqCst) {
            // Silent baseline: replace the committed value, notify nobody.
            self.cell.publish(Debounced::Settled(value));
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.clear_timer();

        let last = self.get_snapshot().value().clone();
        self.cell.publish(Debounced::Pending { last });
        self.listeners.notify_all();

        let store = self.clone();
        let token = self.driver.schedule(
            self.quiet_period,
            Box::new(move || store.commit(value, generation)),
        );
        *self.timer.lock() = Some(token);
    }

    fn commit(&self, value: T, generation: u64) {
        // A request or disposal after this timer was scheduled supersedes it.
        if self.disposed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        self.timer.lock().take();
        self.cell.publish(Debounced::Settled(value));
        self.listeners.notify_all();
    }

    /// Read the current snapshot. Reference-stable between transitions.
    pub fn get_snapshot(&self) -> Arc<Debounced<T>> {
        match self.cell.get() {
            Snapshot::Ready(value) => value,
            Snapshot::Unready => unreachable_cell(),
        }
    }

    /// Check whether a request is waiting out its quiet period.
    pub fn is_pending(&self) -> bool {
        self.get_snapshot().is_pending()
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

impl<T> Clone for DebouncedStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            listeners: self.listeners.clone(),
            driver: Arc::clone(&self.driver),
            quiet_period: self.quiet_period,
            initialized: Arc::clone(&self.initialized),
            disposed: Arc::clone(&self.disposed),
            generation: Arc::clone(&self.generation),
            timer: Arc::clone(&self.timer),
        }
    }
}

// The timing cells are constructed ready and only ever re-published, never
// reset.
fn unreachable_cell() -> ! {
    unreachable!("timing cell is ready from construction")
}

/// Debounces invocations of an action: the action runs with the latest
/// argument once calls stop arriving for the quiet period.
///
/// Unlike [`DebouncedStore`] there is no initial value, so the very first
/// call schedules like any other.
pub struct DebouncedCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    action: Arc<dyn Fn(A) + Send + Sync>,
    driver: Arc<dyn TimerDriver>,
    quiet_period: Duration,
    pending: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    timer: Arc<Mutex<Option<TimerToken>>>,
}

impl<A> DebouncedCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Wrap `action`. Fails fast on a zero quiet period.
    pub fn new<F>(
        action: F,
        quiet_period: Duration,
        driver: Arc<dyn TimerDriver>,
    ) -> Result<Self, StoreError>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        if quiet_period.is_zero() {
            return Err(StoreError::ZeroInterval);
        }
        Ok(Self {
            action: Arc::new(action),
            driver,
            quiet_period,
            pending: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Arc::new(Mutex::new(None)),
        })
    }

    /// Schedule the action with `argument`, superseding any earlier call
    /// still waiting.
    pub fn call(&self, argument: A) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }
        self.pending.store(true, Ordering::SeqCst);

        let callback = self.clone();
        let token = self.driver.schedule(
            self.quiet_period,
            Box::new(move || callback.fire(argument, generation)),
        );
        *self.timer.lock() = Some(token);
    }

    fn fire(&self, argument: A, generation: u64) {
        if self.disposed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        self.timer.lock().take();
        self.pending.store(false, Ordering::SeqCst);
        (self.action)(argument);
    }

    /// Check whether a call is waiting out its quiet period.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Cancel any scheduled invocation and stop accepting calls. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending.store(false, Ordering::SeqCst);
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }
    }
}

impl<A> Clone for DebouncedCallback<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            action: Arc::clone(&self.action),
            driver: Arc::clone(&self.driver),
            quiet_period: self.quiet_period,
            pending: Arc::clone(&self.pending),
            disposed: Arc::clone(&self.disposed),
            generation: Arc::clone(&self.generation),
            timer: Arc::clone(&self.timer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::timer::ManualTimerDriver;
    use std::sync::atomic::AtomicI32;
    use std::sync::RwLock;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn store_with_driver(initial: &'static str) -> (DebouncedStore<&'static str>, ManualTimerDriver) {
        let driver = ManualTimerDriver::new();
        let store =
            DebouncedStore::new(initial, ms(200), Arc::new(driver.clone())).unwrap();
        (store, driver)
    }

    #[test]
    fn zero_quiet_period_is_rejected() {
        let driver: Arc<dyn TimerDriver> = Arc::new(ManualTimerDriver::new());
        assert!(matches!(
            DebouncedStore::new(0, Duration::ZERO, driver),
            Err(StoreError::ZeroInterval)
        ));
    }

    #[test]
    fn starts_settled_at_initial_value() {
        let (store, _driver) = store_with_driver("initial");
        assert_eq!(*store.get_snapshot(), Debounced::Settled("initial"));
        assert!(!store.is_pending());
    }

    #[test]
    fn first_request_is_a_silent_baseline() {
        let (store, driver) = store_with_driver("initial");
        let notified = Arc::new(AtomicI32::new(0));
        let notified_clone = notified.clone();
        let _guard = store.subscribe(move || {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.request("baseline");

        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(store.get_snapshot().value(), &"baseline");
        assert!(!store.is_pending());
        assert_eq!(driver.pending_timers(), 0);
    }

    #[test]
    fn commits_after_quiet_period() {
        let (store, driver) = store_with_driver("initial");
        store.request("initial"); // baseline

        store.request("updated");
        assert!(store.is_pending());
        assert_eq!(store.get_snapshot().value(), &"initial");

        driver.advance(ms(199));
        assert!(store.is_pending());

        driver.advance(ms(1));
        assert_eq!(*store.get_snapshot(), Debounced::Settled("updated"));
        assert!(!store.is_pending());
    }

    #[test]
    fn new_request_restarts_the_quiet_period() {
        let (store, driver) = store_with_driver("initial");
        store.request("initial"); // baseline

        store.request("first");
        driver.advance(ms(100));
        store.request("second");

        driver.advance(ms(199));
        assert_eq!(store.get_snapshot().value(), &"initial");
        assert!(store.is_pending());

        driver.advance(ms(1));
        assert_eq!(*store.get_snapshot(), Debounced::Settled("second"));
    }

    #[test]
    fn repeating_the_committed_value_still_resets_timing() {
        let (store, driver) = store_with_driver("initial");
        store.request("initial"); // baseline

        // No value-equality short-circuit: same value, full cycle.
        store.request("initial");
        assert!(store.is_pending());

        driver.advance(ms(200));
        assert!(!store.is_pending());
        assert_eq!(store.get_snapshot().value(), &"initial");
    }

    #[test]
    fn pending_transition_notifies_listeners() {
        let (store, driver) = store_with_driver("initial");
        store.request("initial"); // baseline

        let events = Arc::new(RwLock::new(Vec::new()));
        let events_clone = events.clone();
        let probe = store.clone();
        let _guard = store.subscribe(move || {
            let snapshot = probe.get_snapshot();
            events_clone
                .write()
                .unwrap()
                .push((*snapshot.value(), snapshot.is_pending()));
        });

        store.request("typed");
        driver.advance(ms(200));

        assert_eq!(
            *events.read().unwrap(),
            vec![("initial", true), ("typed", false)]
        );
    }

    #[test]
    fn snapshot_identity_is_stable_while_pending() {
        let (store, _driver) = store_with_driver("initial");
        store.request("initial"); // baseline
        store.request("updated");

        let first = store.get_snapshot();
        let second = store.get_snapshot();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn dispose_cancels_without_committing() {
        let (store, driver) = store_with_driver("initial");
        store.request("initial"); // baseline

        store.request("doomed");
        store.dispose();
        store.dispose(); // idempotent

        driver.advance(ms(500));
        assert_eq!(store.get_snapshot().value(), &"initial");
        assert!(store.is_disposed());

        // Requests after disposal are ignored.
        store.request("ignored");
        driver.advance(ms(500));
        assert_eq!(store.get_snapshot().value(), &"initial");
    }

    #[test]
    fn callback_fires_once_with_latest_argument() {
        let driver = ManualTimerDriver::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();

        let debounced = DebouncedCallback::new(
            move |argument: &'static str| {
                seen_clone.write().unwrap().push(argument);
            },
            ms(200),
            Arc::new(driver.clone()),
        )
        .unwrap();

        debounced.call("first");
        assert!(debounced.is_pending());

        driver.advance(ms(100));
        debounced.call("second");

        driver.advance(ms(200));
        assert_eq!(*seen.read().unwrap(), vec!["second"]);
        assert!(!debounced.is_pending());
    }

    #[test]
    fn disposed_callback_never_runs() {
        let driver = ManualTimerDriver::new();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        let debounced = DebouncedCallback::new(
            move |_: u32| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            },
            ms(200),
            Arc::new(driver.clone()),
        )
        .unwrap();

        debounced.call(1);
        debounced.dispose();

        driver.advance(ms(500));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!debounced.is_pending());
    }
}
