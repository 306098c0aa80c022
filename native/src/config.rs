// Listener configuration with environment overrides.

use std::time::Duration;

use log::warn;

/// Class name the broadcasting applications target. Changing it breaks the
/// compatibility surface, so the override exists for testing only.
pub const DEFAULT_CLASS_NAME: &str = "MsnMsgrUIManager";

const DEFAULT_DEBOUNCE_MS: u64 = 5_000;
const DEFAULT_POLL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Window class to register. Must match the broadcaster's target string.
    pub class_name: String,
    /// Quiet period before an accepted update is delivered.
    pub debounce: Duration,
    /// Supervisor schedule driving registration retries and pump cycles.
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_CLASS_NAME.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl ListenerConfig {
    /// Defaults overridden by `MSN_LISTENER_DEBOUNCE_MS`,
    /// `MSN_LISTENER_POLL_MS` and `MSN_LISTENER_CLASS_NAME`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_millis("MSN_LISTENER_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = read_millis("MSN_LISTENER_POLL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(name) = std::env::var("MSN_LISTENER_CLASS_NAME") {
            if !name.is_empty() {
                config.class_name = name;
            }
        }

        config
    }
}

fn read_millis(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            warn!("[CONFIG] Ignoring invalid {} value: {:?}", var, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListenerConfig::default();
        assert_eq!(config.class_name, "MsnMsgrUIManager");
        assert_eq!(config.debounce, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }
}
