// Logging, crash logging and optional Sentry reporting.

use log::{error, info, LevelFilter};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static CRASH_LOG_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);
static SENTRY_GUARD: Mutex<Option<sentry::ClientInitGuard>> = Mutex::new(None);

/// Initialize env_logger. Defaults to `info` when `RUST_LOG` is unset so the
/// runner prints intercepted updates without extra configuration.
pub fn init_logger() {
    let mut builder = env_logger::Builder::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Info);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    let _ = builder.try_init();
}

/// Initialize Sentry with an optional DSN; disabled when none is given.
pub fn init_sentry(dsn: Option<&str>, environment: Option<&str>) -> bool {
    let dsn_value = match dsn {
        Some(d) if !d.is_empty() => d,
        _ => {
            info!("[SENTRY] No DSN provided - Sentry disabled");
            return false;
        }
    };

    let guard = sentry::init((
        dsn_value,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: environment.map(|e| std::borrow::Cow::Owned(e.to_string())),
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    if guard.is_enabled() {
        *SENTRY_GUARD.lock().unwrap() = Some(guard);
        true
    } else {
        info!("[SENTRY] Failed to initialize");
        false
    }
}

pub fn is_sentry_enabled() -> bool {
    let guard = SENTRY_GUARD.lock().unwrap();
    guard.as_ref().map_or(false, |g| g.is_enabled())
}

/// End the Sentry session and flush pending events.
pub fn shutdown_sentry() {
    let mut guard_lock = SENTRY_GUARD.lock().unwrap();
    if let Some(guard) = guard_lock.take() {
        drop(guard);
        info!("[SENTRY] Shutdown complete");
    }
}

/// Report an error that prevents the listener from functioning.
pub fn capture_critical_error(context: &str, error: &str) {
    if is_sentry_enabled() {
        sentry::with_scope(
            |scope| {
                scope.set_tag("error_type", "critical");
                scope.set_tag("context", context);
                scope.set_level(Some(sentry::Level::Fatal));
            },
            || {
                sentry::capture_message(
                    &format!("[CRITICAL] {}: {}", context, error),
                    sentry::Level::Fatal,
                );
            },
        );
    }
}

/// Install the panic hook and pick the crash log location.
pub fn init_crash_logger() {
    let log_dir = if let Some(local_data) = dirs::data_local_dir() {
        local_data.join("MsnStatusListener")
    } else {
        PathBuf::from(".")
    };

    let _ = fs::create_dir_all(&log_dir);
    let log_path = log_dir.join("listener_crash.log");

    {
        let mut path_guard = CRASH_LOG_PATH.lock().unwrap();
        *path_guard = Some(log_path.clone());
    }

    std::panic::set_hook(Box::new(move |panic_info| {
        let crash_msg = format_panic_message(panic_info);

        if is_sentry_enabled() {
            sentry::capture_message(&crash_msg, sentry::Level::Fatal);
        }

        if let Err(e) = write_crash_log(&crash_msg) {
            error!("[CRASH LOGGER] Failed to write crash log: {}", e);
        }

        error!("\n{}", crash_msg);
    }));

    info!("[CRASH LOGGER] Initialized - Log: {:?}", log_path);
}

fn format_panic_message(panic_info: &std::panic::PanicHookInfo) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    };

    let location = panic_info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "Unknown location".to_string());

    format!(
        "===== PANIC =====\nTimestamp: {}\nLocation: {}\nMessage: {}\nThread: {:?}\n\nBacktrace:\n{:?}\n",
        timestamp,
        location,
        payload,
        std::thread::current().name().unwrap_or("unnamed"),
        std::backtrace::Backtrace::capture()
    )
}

fn write_crash_log(message: &str) -> std::io::Result<()> {
    let path_guard = CRASH_LOG_PATH.lock().unwrap();
    if let Some(ref log_path) = *path_guard {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        writeln!(file, "{}", message)?;
    }
    Ok(())
}
