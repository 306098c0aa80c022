// Console runner for the status-broadcast listener.

extern crate msn_status_listener;

use std::sync::Arc;

use log::{error, info};

use msn_status_listener::{logging, notifier, ListenerConfig, StatusUpdate};

#[cfg(windows)]
const INSTANCE_MUTEX: &str = "Global\\MsnStatusListener";

fn main() {
    // Load or ignore .env file
    let _ = dotenvy::dotenv();

    logging::init_logger();
    logging::init_crash_logger();

    // Sentry is opt-in via environment; the listener runs fine without it.
    if let Ok(dsn) = std::env::var("LISTENER_SENTRY_DSN") {
        let environment = std::env::var("SENTRY_ENVIRONMENT").ok();
        if logging::init_sentry(Some(&dsn), environment.as_deref()) {
            info!(
                "[MAIN] Sentry monitoring initialized - Environment: {:?}",
                environment
            );
        }
    } else {
        info!("[MAIN] Sentry monitoring disabled (no LISTENER_SENTRY_DSN configured)");
    }

    info!(
        "[MAIN] MSN status listener v{} starting",
        msn_status_listener::get_version()
    );

    // Two listeners would race for the same class name.
    #[cfg(windows)]
    let _single_instance_guard = match single_instance::SingleInstanceGuard::acquire(INSTANCE_MUTEX)
    {
        Ok(guard) => guard,
        Err(single_instance::SingleInstanceError::AlreadyRunning) => {
            error!("[MAIN] Another listener instance is already running - exiting");
            return;
        }
        Err(e) => {
            error!("[MAIN] Could not check for a running instance: {}", e);
            logging::capture_critical_error("Instance Check", &e.to_string());
            return;
        }
    };

    notifier::register_window_state_callback(|live| {
        if live {
            info!("[MAIN] Disguised window live - broadcasts will be intercepted");
        } else {
            info!("[MAIN] Disguised window lost - waiting for re-registration");
        }
    });

    let config = ListenerConfig::from_env();
    info!(
        "[MAIN] Listening on window class {:?} (debounce {:?}, schedule {:?})",
        config.class_name, config.debounce, config.poll_interval
    );

    let on_status = Arc::new(|update: StatusUpdate| match serde_json::to_string(update.tokens()) {
        Ok(record) => info!("[STATUS] {}", record),
        Err(e) => error!("[STATUS] Failed to encode update: {}", e),
    });

    if let Err(e) = msn_status_listener::start_internal(config, on_status) {
        error!("[MAIN] Failed to start listener: {}", e);
        logging::capture_critical_error("Listener Startup", &e.to_string());
        logging::shutdown_sentry();
        return;
    }

    wait_for_shutdown();

    match msn_status_listener::stop_internal() {
        Ok(stats) => info!(
            "[MAIN] Shutdown complete - {} broadcasts seen, {} duplicates suppressed, {} deliveries",
            stats.broadcasts_seen, stats.duplicates_suppressed, stats.deliveries
        ),
        Err(e) => error!("[MAIN] Shutdown error: {}", e),
    }

    logging::shutdown_sentry();
}

/// Block until Ctrl-C.
fn wait_for_shutdown() {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("[MAIN] Failed to build signal runtime: {}", e);
            return;
        }
    };

    info!("[MAIN] Running - press Ctrl-C to stop");
    if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
        error!("[MAIN] Failed to wait for Ctrl-C: {}", e);
    }
}

#[cfg(windows)]
mod single_instance {
    use windows::core::{Error as Win32Error, PCWSTR};
    use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE};
    use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};

    /// Named-mutex guard enforcing one listener per session.
    pub struct SingleInstanceGuard {
        handle: HANDLE,
    }

    impl SingleInstanceGuard {
        pub fn acquire(name: &str) -> Result<Self, SingleInstanceError> {
            let wide_name: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

            unsafe {
                let handle = CreateMutexW(None, true.into(), PCWSTR(wide_name.as_ptr()))
                    .map_err(SingleInstanceError::CreateFailed)?;

                if GetLastError() == ERROR_ALREADY_EXISTS {
                    let _ = CloseHandle(handle);
                    return Err(SingleInstanceError::AlreadyRunning);
                }

                Ok(Self { handle })
            }
        }
    }

    impl Drop for SingleInstanceGuard {
        fn drop(&mut self) {
            unsafe {
                if self.handle.is_invalid() {
                    return;
                }
                let _ = ReleaseMutex(self.handle);
                let _ = CloseHandle(self.handle);
                self.handle = HANDLE::default();
            }
        }
    }

    #[derive(Debug)]
    pub enum SingleInstanceError {
        AlreadyRunning,
        CreateFailed(Win32Error),
    }

    impl std::fmt::Display for SingleInstanceError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                SingleInstanceError::AlreadyRunning => write!(f, "instance already running"),
                SingleInstanceError::CreateFailed(err) => write!(f, "system error: {}", err),
            }
        }
    }

    impl std::error::Error for SingleInstanceError {}
}
