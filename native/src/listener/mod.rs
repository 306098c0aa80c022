// Disguised-window interception of the messenger status broadcast.

pub mod context;
pub mod install;
pub mod supervisor;
#[cfg(windows)]
pub mod window;

pub use context::{ListenerContext, StatsSnapshot};
pub use supervisor::StatusListener;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("window class registration failed (error code {0})")]
    ClassRegistration(u32),
    #[error("window creation failed: {0}")]
    WindowCreation(String),
    #[error("listener already running")]
    AlreadyRunning,
    #[error("listener not running")]
    NotRunning,
    #[error("scheduler runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("status interception requires a Windows host")]
    Unsupported,
}

/// Result of draining one pump cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Queue temporarily empty; the window stays up.
    Drained,
    /// A quit message was retrieved or the window is gone for good.
    Quit,
}

/// Seam between the supervisor schedule and the platform window, so the
/// retry/self-heal loop can be exercised without a desktop session.
pub(crate) trait MessageWindow {
    /// Register the class and create the hidden window if absent.
    fn ensure_window(&mut self) -> Result<(), ListenerError>;

    fn is_open(&self) -> bool;

    /// Drain currently queued messages, dispatching each to the window
    /// procedure.
    fn pump_cycle(&mut self) -> PumpOutcome;

    /// Tear the window down; safe to call when nothing is open.
    fn close(&mut self);
}
