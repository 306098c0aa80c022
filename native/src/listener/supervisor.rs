// Listener lifecycle and the periodic register/pump supervisor.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use super::context::{ListenerContext, StatsSnapshot};
use super::{ListenerError, MessageWindow, PumpOutcome};
use crate::config::ListenerConfig;
use crate::debounce::{DebounceEngine, DeliveryCallback};
use crate::notifier;

/// Owner of the disguised-window interception: a dedicated pump thread plus
/// the shared context feeding the debounce engine.
pub struct StatusListener {
    context: Arc<ListenerContext>,
    pump_thread: Option<JoinHandle<()>>,
}

impl StatusListener {
    /// Register the disguised window and begin intercepting broadcasts.
    ///
    /// `on_status` runs on the debounce scheduler, at most once per settled
    /// burst of distinct broadcasts.
    pub fn start(
        config: ListenerConfig,
        on_status: DeliveryCallback,
    ) -> Result<Self, ListenerError> {
        let engine = DebounceEngine::new(config.debounce, on_status)?;
        let context = Arc::new(ListenerContext::new(engine));
        context.set_state_observer(notifier::notify_window_state);
        Self::spawn_pump(config, context)
    }

    #[cfg(windows)]
    fn spawn_pump(
        config: ListenerConfig,
        context: Arc<ListenerContext>,
    ) -> Result<Self, ListenerError> {
        let thread_context = Arc::clone(&context);
        let pump_thread = std::thread::Builder::new()
            .name("status-pump".to_string())
            .spawn(move || {
                // The window must live and die on this thread; its queue is
                // bound to whichever thread created it.
                let mut window =
                    super::window::Win32Window::new(&config.class_name, Arc::clone(&thread_context));
                run_supervisor(&mut window, &thread_context, config.poll_interval);
            })?;

        info!("[LISTENER] Pump thread started");
        Ok(Self {
            context,
            pump_thread: Some(pump_thread),
        })
    }

    #[cfg(not(windows))]
    fn spawn_pump(
        _config: ListenerConfig,
        _context: Arc<ListenerContext>,
    ) -> Result<Self, ListenerError> {
        Err(ListenerError::Unsupported)
    }

    /// Whether the disguised window is currently registered and pumping.
    pub fn is_window_open(&self) -> bool {
        self.context.window_live()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.context.stats()
    }

    /// Stop the supervisor, tear the window down and cancel any pending
    /// delivery. Idempotent.
    pub fn stop(&mut self) {
        self.context.request_stop();
        if let Some(handle) = self.pump_thread.take() {
            let _ = handle.join();
            info!("[LISTENER] Pump thread stopped");
        }
    }
}

impl Drop for StatusListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed-rate supervisor: each cycle (re)creates the window if needed, then
/// drains its queue. Registration failures and externally destroyed windows
/// heal on a later cycle without restarting the process.
pub(crate) fn run_supervisor<W: MessageWindow>(
    window: &mut W,
    context: &ListenerContext,
    poll_interval: Duration,
) {
    debug!("[PUMP] Supervisor running every {:?}", poll_interval);

    while !context.stopping() {
        if !window.is_open() {
            match window.ensure_window() {
                Ok(()) => {
                    info!("[PUMP] Listener window up");
                    context.notify_window_live(true);
                }
                Err(e) => {
                    // Retried on the next scheduled cycle.
                    warn!("[PUMP] Window registration failed: {}", e);
                }
            }
        }

        if window.is_open() {
            match window.pump_cycle() {
                PumpOutcome::Drained => {}
                PumpOutcome::Quit => {
                    warn!("[PUMP] Window quit; re-registering on a later cycle");
                    window.close();
                    context.notify_window_live(false);
                }
            }
        }

        context.wait_tick(poll_interval);
    }

    window.close();
    if context.window_live() {
        context.notify_window_live(false);
    }
    debug!("[PUMP] Supervisor exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct FakeWindow {
        open: bool,
        registrations_to_fail: usize,
        register_attempts: Arc<AtomicUsize>,
        cycles: Arc<AtomicUsize>,
        quit_on_cycles: Arc<Mutex<Vec<usize>>>,
    }

    impl FakeWindow {
        fn new(registrations_to_fail: usize) -> Self {
            Self {
                open: false,
                registrations_to_fail,
                register_attempts: Arc::new(AtomicUsize::new(0)),
                cycles: Arc::new(AtomicUsize::new(0)),
                quit_on_cycles: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl MessageWindow for FakeWindow {
        fn ensure_window(&mut self) -> Result<(), ListenerError> {
            let attempt = self.register_attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.registrations_to_fail {
                return Err(ListenerError::ClassRegistration(8));
            }
            self.open = true;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn pump_cycle(&mut self) -> PumpOutcome {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst);
            if self.quit_on_cycles.lock().unwrap().contains(&cycle) {
                return PumpOutcome::Quit;
            }
            PumpOutcome::Drained
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    fn idle_context() -> Arc<ListenerContext> {
        let engine =
            DebounceEngine::new(Duration::from_millis(50), Arc::new(|_update| {})).unwrap();
        Arc::new(ListenerContext::new(engine))
    }

    fn run_in_thread(
        mut window: FakeWindow,
        context: Arc<ListenerContext>,
        poll_interval: Duration,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || run_supervisor(&mut window, &context, poll_interval))
    }

    #[test]
    fn test_registration_failures_heal_without_intervention() {
        let context = idle_context();
        let window = FakeWindow::new(3);
        let attempts = Arc::clone(&window.register_attempts);
        let cycles = Arc::clone(&window.cycles);

        let handle = run_in_thread(window, Arc::clone(&context), Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(120));

        assert!(context.window_live(), "pump never became operational");
        assert!(attempts.load(Ordering::SeqCst) >= 4);
        assert!(cycles.load(Ordering::SeqCst) >= 1);

        context.request_stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_quit_triggers_reregistration() {
        let context = idle_context();
        let window = FakeWindow::new(0);
        window.quit_on_cycles.lock().unwrap().push(0);
        let attempts = Arc::clone(&window.register_attempts);

        let handle = run_in_thread(window, Arc::clone(&context), Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(120));

        assert!(context.window_live());
        assert!(attempts.load(Ordering::SeqCst) >= 2);

        context.request_stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_stop_interrupts_long_tick() {
        let context = idle_context();
        let window = FakeWindow::new(0);

        let handle = run_in_thread(window, Arc::clone(&context), Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(50));

        let stop_started = Instant::now();
        context.request_stop();
        handle.join().unwrap();

        assert!(stop_started.elapsed() < Duration::from_secs(2));
        assert!(!context.window_live());
    }
}
