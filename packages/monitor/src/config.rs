//! Monitor configuration.
//!
//! Values come from an optional TOML file, then the `JAM_WATCH_RUNS_DIR`
//! environment variable, then command-line overrides applied by the caller.

use std::path::{Path, PathBuf};

use jam_watch_analytics_models::{AlertConfig, DEFAULT_SURGE_THRESHOLD_PCT};
use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Environment variable overriding [`MonitorConfig::runs_dir`].
pub const RUNS_DIR_ENV: &str = "JAM_WATCH_RUNS_DIR";

/// Smallest number of runs in a trend/persistence window.
pub const MIN_WINDOW: usize = 2;

/// Largest number of runs in a trend/persistence window.
pub const MAX_WINDOW: usize = 10;

/// Settings for run capture and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Directory holding the run files.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    /// Entity-count increase (percent) that must be exceeded to raise a
    /// surge alert.
    #[serde(default = "default_surge_threshold_pct")]
    pub surge_threshold_pct: f64,
    /// Number of most recent runs used for trend and persistence.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Whether to diff the active run against the previous one.
    #[serde(default = "default_true")]
    pub compare_previous: bool,
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

const fn default_surge_threshold_pct() -> f64 {
    DEFAULT_SURGE_THRESHOLD_PCT
}

const fn default_trend_window() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
            surge_threshold_pct: default_surge_threshold_pct(),
            trend_window: default_trend_window(),
            compare_previous: default_true(),
        }
    }
}

impl MonitorConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, MonitorError> {
        toml::de::from_str(toml_str).map_err(|e| MonitorError::Config {
            message: e.to_string(),
        })
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let contents = std::fs::read_to_string(path).map_err(|e| MonitorError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(RUNS_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.runs_dir = PathBuf::from(dir);
        }
        self
    }

    /// Trend/persistence window clamped to `[MIN_WINDOW, MAX_WINDOW]`.
    #[must_use]
    pub fn window(&self) -> usize {
        self.trend_window.clamp(MIN_WINDOW, MAX_WINDOW)
    }

    #[must_use]
    pub const fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            surge_threshold_pct: self.surge_threshold_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.runs_dir, PathBuf::from("runs"));
        assert!((config.surge_threshold_pct - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.window(), 5);
        assert!(config.compare_previous);
    }

    #[test]
    fn parses_all_keys() {
        let config = MonitorConfig::from_toml_str(
            r#"
            runs_dir = "/var/lib/jam_watch/runs"
            surge_threshold_pct = 25.5
            trend_window = 8
            compare_previous = false
            "#,
        )
        .unwrap();

        assert_eq!(config.runs_dir, PathBuf::from("/var/lib/jam_watch/runs"));
        assert!((config.alert_config().surge_threshold_pct - 25.5).abs() < f64::EPSILON);
        assert_eq!(config.window(), 8);
        assert!(!config.compare_previous);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            MonitorConfig::from_toml_str("trend_window = \"many\""),
            Err(MonitorError::Config { .. })
        ));
    }

    #[test]
    fn window_is_clamped() {
        let mut config = MonitorConfig {
            trend_window: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(config.window(), MIN_WINDOW);
        config.trend_window = 50;
        assert_eq!(config.window(), MAX_WINDOW);
    }

    #[test]
    fn env_override_replaces_runs_dir() {
        let config = MonitorConfig::default()
            .with_overrides_from(|key| (key == RUNS_DIR_ENV).then(|| "/tmp/runs".to_string()));
        assert_eq!(config.runs_dir, PathBuf::from("/tmp/runs"));

        let config = MonitorConfig::default().with_overrides_from(|_| Some("  ".to_string()));
        assert_eq!(config.runs_dir, PathBuf::from("runs"));
    }
}
