//! Runtime Configuration
//!
//! Configuration is per thread, like the reactive runtime itself. Install a
//! [`Config`] with [`configure`] before defining components; everything reads
//! the active values through [`config`].

use std::cell::RefCell;
use std::time::Duration;

use serde::Deserialize;

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Tunables of the reactive runtime and the effect library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event types whose listeners are registered passive and whose handlers
    /// run through the frame scheduler.
    pub passive_events: Vec<String>,

    /// Maximum time an async task may take before it resolves to a
    /// dependency timeout.
    pub dependency_timeout_ms: u64,

    /// Upper bound on effect flush rounds within one flush. Protects against
    /// effects that keep invalidating each other.
    pub max_flush_rounds: usize,

    /// Log a warning when an optional UI query matches nothing.
    pub warn_on_missing_optional: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            passive_events: ["scroll", "resize", "touchstart", "touchmove", "touchend", "wheel"]
                .into_iter()
                .map(String::from)
                .collect(),
            dependency_timeout_ms: 30_000,
            max_flush_rounds: 100,
            warn_on_missing_optional: false,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The dependency timeout as a [`Duration`].
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    /// Whether listeners for `event_type` are passive.
    pub fn is_passive(&self, event_type: &str) -> bool {
        self.passive_events.iter().any(|t| t == event_type)
    }
}

/// Install a configuration for the current thread.
pub fn configure(config: Config) {
    tracing::debug!(?config, "installing runtime configuration");
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// A snapshot of the active configuration.
pub fn config() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

pub(crate) fn with_config<R>(f: impl FnOnce(&Config) -> R) -> R {
    CONFIG.with(|c| f(&c.borrow()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mark_scroll_passive() {
        let config = Config::default();
        assert!(config.is_passive("scroll"));
        assert!(config.is_passive("wheel"));
        assert!(!config.is_passive("click"));
    }

    #[test]
    fn json_overrides_keep_other_defaults() {
        let config = Config::from_json(r#"{ "max_flush_rounds": 5 }"#).unwrap();
        assert_eq!(config.max_flush_rounds, 5);
        assert_eq!(config.dependency_timeout_ms, 30_000);
        assert!(config.is_passive("touchmove"));
    }

    #[test]
    fn configure_is_per_thread() {
        configure(Config {
            dependency_timeout_ms: 10,
            ..Config::default()
        });
        assert_eq!(config().dependency_timeout(), Duration::from_millis(10));

        let other = std::thread::spawn(|| config().dependency_timeout_ms)
            .join()
            .unwrap();
        assert_eq!(other, 30_000);

        configure(Config::default());
    }
}
