// Debounced, cancellable delivery of accepted status updates.
//
// A burst of distinct broadcasts re-arms a single delayed task; only the
// update that survives the quiet period is handed to the consumer. Task
// abort is best-effort, so every fire re-checks the generation counter and
// a superseded task degrades to a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use crate::payload::StatusUpdate;

/// Consumer callback invoked once per settled burst.
pub type DeliveryCallback = Arc<dyn Fn(StatusUpdate) + Send + Sync>;

/// Delayed delivery scheduler running on its own runtime, separate from the
/// message-pump thread.
pub struct DebounceEngine {
    runtime: Option<tokio::runtime::Runtime>,
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    callback: DeliveryCallback,
    deliveries: Arc<AtomicU64>,
}

impl DebounceEngine {
    pub fn new(delay: Duration, callback: DeliveryCallback) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            runtime: Some(runtime),
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            callback,
            deliveries: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Re-arm the quiet-period timer for `update`.
    ///
    /// Any previously scheduled delivery is cancelled; if nothing newer
    /// arrives within the delay, `update` is delivered exactly once.
    pub fn arm(&self, update: Arc<StatusUpdate>) {
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };

        let armed_at = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let generation = Arc::clone(&self.generation);
        let callback = Arc::clone(&self.callback);
        let deliveries = Arc::clone(&self.deliveries);
        let delay = self.delay;

        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            // A newer arm or a cancel moved the counter past us.
            if generation.load(Ordering::SeqCst) != armed_at {
                debug!("[DEBOUNCE] Stale delivery task skipped (superseded)");
                return;
            }

            deliveries.fetch_add(1, Ordering::Relaxed);
            callback((*update).clone());
        }));
    }

    /// Cancel any pending delivery. A task already past its generation check
    /// may still deliver; the outcome is 0 or 1 deliveries, never more.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    /// Total deliveries handed to the consumer so far.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }
}

impl Drop for DebounceEngine {
    fn drop(&mut self) {
        self.cancel();
        if let Some(runtime) = self.runtime.take() {
            // Never block teardown on a sleeping delivery task.
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn collecting_engine(delay_ms: u64) -> (DebounceEngine, Arc<Mutex<Vec<StatusUpdate>>>) {
        let delivered: Arc<Mutex<Vec<StatusUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let engine = DebounceEngine::new(
            Duration::from_millis(delay_ms),
            Arc::new(move |update| sink.lock().unwrap().push(update)),
        )
        .unwrap();
        (engine, delivered)
    }

    #[test]
    fn test_burst_coalesces_to_last_update() {
        let (engine, delivered) = collecting_engine(100);

        for tokens in [["P1"], ["P2"], ["P3"]] {
            engine.arm(Arc::new(StatusUpdate::from_tokens(tokens)));
            sleep(Duration::from_millis(10));
        }

        sleep(Duration::from_millis(400));
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].tokens(), &["P3"]);
        assert_eq!(engine.deliveries(), 1);
    }

    #[test]
    fn test_settled_bursts_each_deliver() {
        let (engine, delivered) = collecting_engine(100);

        engine.arm(Arc::new(StatusUpdate::from_tokens(["P1"])));
        sleep(Duration::from_millis(350));
        engine.arm(Arc::new(StatusUpdate::from_tokens(["P2"])));
        sleep(Duration::from_millis(350));

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].tokens(), &["P1"]);
        assert_eq!(delivered[1].tokens(), &["P2"]);
    }

    #[test]
    fn test_cancel_before_fire_suppresses_delivery() {
        let (engine, delivered) = collecting_engine(150);

        engine.arm(Arc::new(StatusUpdate::from_tokens(["P1"])));
        sleep(Duration::from_millis(20));
        engine.cancel();

        sleep(Duration::from_millis(400));
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_at_fire_boundary_delivers_at_most_once() {
        let (engine, delivered) = collecting_engine(50);

        engine.arm(Arc::new(StatusUpdate::from_tokens(["P1"])));
        // Land the cancel as close to the fire instant as a sleep allows.
        sleep(Duration::from_millis(50));
        engine.cancel();

        sleep(Duration::from_millis(250));
        assert!(delivered.lock().unwrap().len() <= 1);
    }

    #[test]
    fn test_cancel_without_pending_is_noop() {
        let (engine, delivered) = collecting_engine(50);
        engine.cancel();
        engine.cancel();
        sleep(Duration::from_millis(100));
        assert!(delivered.lock().unwrap().is_empty());
    }
}
