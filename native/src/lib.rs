pub mod config;
pub mod debounce;
pub mod listener;
pub mod logging;
pub mod notifier;
pub mod payload;

use log::info;
use std::sync::Mutex;

// Re-export the types a consumer needs to drive the listener.
pub use config::ListenerConfig;
pub use debounce::DeliveryCallback;
pub use listener::{ListenerError, StatsSnapshot, StatusListener};
pub use payload::StatusUpdate;

// Process-global listener instance used by the runner binary. Library
// consumers wanting independent instances hold `StatusListener` directly.
pub static LISTENER: Mutex<Option<StatusListener>> = Mutex::new(None);

/// Start the process-global listener.
pub fn start_internal(
    config: ListenerConfig,
    on_status: DeliveryCallback,
) -> Result<(), ListenerError> {
    let mut guard = LISTENER.lock().unwrap();
    if guard.is_some() {
        return Err(ListenerError::AlreadyRunning);
    }

    let listener = StatusListener::start(config, on_status)?;
    *guard = Some(listener);

    info!("[INIT] Status listener started");
    Ok(())
}

/// Stop the process-global listener, returning its final counters.
pub fn stop_internal() -> Result<StatsSnapshot, ListenerError> {
    let mut guard = LISTENER.lock().unwrap();
    let Some(mut listener) = guard.take() else {
        return Err(ListenerError::NotRunning);
    };

    listener.stop();
    let stats = listener.stats();

    info!("[CLEANUP] Status listener stopped");
    Ok(stats)
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
