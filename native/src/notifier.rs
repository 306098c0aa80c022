// Host notification helpers for listener state changes.
//
// Delivery of decoded updates goes through the callback handed to
// `StatusListener::start`; this registry only reports whether the disguised
// window is currently live, so a host binary can surface liveness.

use log::debug;
use once_cell::sync::Lazy;
use std::sync::Mutex;

static WINDOW_STATE_CALLBACK: Lazy<Mutex<Option<Box<dyn Fn(bool) + Send + Sync>>>> =
    Lazy::new(|| Mutex::new(None));

/// Register a callback invoked when the listener window comes up or is lost.
pub fn register_window_state_callback<F>(callback: F)
where
    F: Fn(bool) + Send + Sync + 'static,
{
    let mut cb = WINDOW_STATE_CALLBACK.lock().unwrap();
    *cb = Some(Box::new(callback));
}

/// Drop the registered window-state callback.
pub fn clear_window_state_callback() {
    let mut cb = WINDOW_STATE_CALLBACK.lock().unwrap();
    *cb = None;
}

pub(crate) fn notify_window_state(live: bool) {
    debug!(
        "[NOTIFIER] Listener window {}",
        if live { "LIVE" } else { "LOST" }
    );

    if let Some(ref callback) = *WINDOW_STATE_CALLBACK.lock().unwrap() {
        callback(live);
    }
}
