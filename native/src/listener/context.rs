// State shared between the pump thread and the debounce scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use log::debug;

use crate::debounce::DebounceEngine;
use crate::payload::StatusUpdate;

/// Monotonic interception counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub broadcasts_seen: u64,
    pub duplicates_suppressed: u64,
    pub deliveries: u64,
}

/// Per-listener state handed to the window procedure and the debounce task.
///
/// One context per `StatusListener`, so independent instances never share
/// state. The window procedure borrows it through the window's user-data
/// slot; the owning window is always destroyed before the context drops.
pub struct ListenerContext {
    // Written only from the pump thread, read by the debounce task at fire
    // time. ArcSwap keeps the cross-thread hand-off lock-free.
    last_seen: ArcSwapOption<StatusUpdate>,
    engine: DebounceEngine,

    broadcasts: AtomicU64,
    duplicates: AtomicU64,

    window_live: AtomicBool,
    state_observer: Mutex<Option<Box<dyn Fn(bool) + Send + Sync>>>,
    stop: AtomicBool,
    tick: Mutex<()>,
    tick_signal: Condvar,
}

impl ListenerContext {
    pub fn new(engine: DebounceEngine) -> Self {
        Self {
            last_seen: ArcSwapOption::empty(),
            engine,
            broadcasts: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            window_live: AtomicBool::new(false),
            state_observer: Mutex::new(None),
            stop: AtomicBool::new(false),
            tick: Mutex::new(()),
            tick_signal: Condvar::new(),
        }
    }

    /// Run one decoded broadcast through the dedup check.
    ///
    /// Returns `false` when the update exactly repeats the previous accepted
    /// one (the caller short-circuits); otherwise the update becomes the new
    /// last-seen value and the delivery timer is re-armed.
    pub fn accept(&self, update: StatusUpdate) -> bool {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);

        let previous = self.last_seen.load();
        if previous.as_deref() == Some(&update) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!("[LISTENER] Duplicate broadcast suppressed");
            return false;
        }

        let update = Arc::new(update);
        self.last_seen.store(Some(Arc::clone(&update)));
        self.engine.arm(update);
        true
    }

    /// Most recently accepted update, if any.
    pub fn last_seen(&self) -> Option<Arc<StatusUpdate>> {
        self.last_seen.load_full()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            broadcasts_seen: self.broadcasts.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates.load(Ordering::Relaxed),
            deliveries: self.engine.deliveries(),
        }
    }

    pub fn window_live(&self) -> bool {
        self.window_live.load(Ordering::Acquire)
    }

    /// Observer invoked whenever the disguised window comes up or is lost.
    pub(crate) fn set_state_observer<F>(&self, observer: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.state_observer.lock().unwrap() = Some(Box::new(observer));
    }

    pub(crate) fn notify_window_live(&self, live: bool) {
        self.window_live.store(live, Ordering::Release);
        if let Some(ref observer) = *self.state_observer.lock().unwrap() {
            observer(live);
        }
    }

    pub(crate) fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop the supervisor at its next wakeup and cancel any pending
    /// delivery.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.engine.cancel();

        let _guard = self.tick.lock().unwrap();
        self.tick_signal.notify_all();
    }

    /// Sleep until the next scheduled cycle or an early stop signal.
    pub(crate) fn wait_tick(&self, period: Duration) {
        let guard = self.tick.lock().unwrap();
        if self.stop.load(Ordering::Acquire) {
            return;
        }
        let _unused = self.tick_signal.wait_timeout(guard, period).unwrap();
    }
}
