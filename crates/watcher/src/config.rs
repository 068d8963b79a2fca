//! Watcher configuration

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default quiet period before a write burst is considered finished
pub const DEFAULT_QUIET_PERIOD_MS: i64 = 500;

/// Default capacity of the output event stream
pub const EVENTS_QUEUE_CAPACITY: usize = 100;

/// Configuration for a [`DirsWatcher`](crate::DirsWatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period in milliseconds (default: 500).
    /// Zero or negative disables coalescing entirely.
    pub quiet_period_ms: i64,

    /// Capacity of the output stream (default: 100)
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            queue_capacity: EVENTS_QUEUE_CAPACITY,
        }
    }
}

impl WatcherConfig {
    /// Quiet period, or `None` when coalescing is disabled
    pub fn quiet_period(&self) -> Option<Duration> {
        u64::try_from(self.quiet_period_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// How often a tracker probes its file
    pub fn probe_interval(&self) -> Option<Duration> {
        self.quiet_period().map(probe_interval)
    }

    /// Check values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(WatchError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| WatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

/// A quarter of the quiet period, never below one millisecond
pub(crate) fn probe_interval(quiet_period: Duration) -> Duration {
    (quiet_period / 4).max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();

        assert_eq!(config.quiet_period_ms, 500);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.quiet_period(), Some(Duration::from_millis(500)));
        assert_eq!(config.probe_interval(), Some(Duration::from_millis(125)));
    }

    #[test]
    fn test_non_positive_quiet_period_disables_coalescing() {
        for ms in [0, -1, -500] {
            let config = WatcherConfig {
                quiet_period_ms: ms,
                ..Default::default()
            };
            assert_eq!(config.quiet_period(), None);
            assert_eq!(config.probe_interval(), None);
        }
    }

    #[test]
    fn test_tiny_quiet_period_probe_floor() {
        assert_eq!(probe_interval(Duration::from_millis(2)), Duration::from_millis(1));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = WatcherConfig::from_toml_str("quiet_period_ms = 100\n").unwrap();

        assert_eq!(config.quiet_period_ms, 100);
        assert_eq!(config.queue_capacity, EVENTS_QUEUE_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = WatcherConfig::from_toml_str("queue_capacity = 0\n").unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settle.toml");
        std::fs::write(&path, "quiet_period_ms = 0\nqueue_capacity = 8\n").unwrap();

        let config = WatcherConfig::load(&path).unwrap();
        assert_eq!(config.quiet_period(), None);
        assert_eq!(config.queue_capacity, 8);

        assert!(WatcherConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
