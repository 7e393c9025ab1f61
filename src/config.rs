//! Scheduler configuration
//!
//! Read from `<config_dir>/nous/srs.toml`. Every field has a default, so a
//! partial (or missing) file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// FSRS-5 default parameters
pub const DEFAULT_WEIGHTS: [f64; 19] = [
    0.40255, 1.18385, 3.173, 15.69105, 7.1949, 0.5345, 1.4604, 0.0046, 1.54575, 0.1192, 1.01925,
    1.9395, 0.11, 0.29605, 2.2698, 0.2315, 2.9898, 0.51655, 0.6621,
];

/// Upper bound on any scheduled interval, in days
pub const INTERVAL_CEILING_DAYS: f64 = 36500.0;

/// Memory model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Target recall probability at the scheduled review
    pub request_retention: f64,
    /// Longest interval ever scheduled, in days
    pub maximum_interval: f64,
    pub weights: Vec<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval: 36500.0,
            weights: DEFAULT_WEIGHTS.to_vec(),
        }
    }
}

impl SchedulerConfig {
    /// Weight `i`, falling back to the default when the configured list is short
    pub fn weight(&self, i: usize) -> f64 {
        self.weights
            .get(i)
            .copied()
            .filter(|w| w.is_finite())
            .unwrap_or(DEFAULT_WEIGHTS[i])
    }

    /// `maximum_interval` bounded to `[1, INTERVAL_CEILING_DAYS]`
    pub fn maximum_interval_days(&self) -> f64 {
        if self.maximum_interval.is_nan() {
            return INTERVAL_CEILING_DAYS;
        }
        self.maximum_interval.clamp(1.0, INTERVAL_CEILING_DAYS)
    }
}

/// Incremental reading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReadingConfig {
    pub default_priority: i32,
    /// Levels walked upward when building a topic breadcrumb
    pub breadcrumb_depth: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            default_priority: 5,
            breadcrumb_depth: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SrsConfig {
    /// Namespace for log prefixes, plugin data and inline fragment types
    pub plugin_name: String,
    /// Tag that marks a block as a card
    pub card_tag: String,
    pub default_deck: String,
    pub scheduler: SchedulerConfig,
    pub reading: ReadingConfig,
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            plugin_name: "orca-srs".to_string(),
            card_tag: "card".to_string(),
            default_deck: "Default".to_string(),
            scheduler: SchedulerConfig::default(),
            reading: ReadingConfig::default(),
        }
    }
}

impl SrsConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nous").join("srs.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No SRS config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("srs.toml");
        fs::write(
            &path,
            "card_tag = \"flashcard\"\n\n[scheduler]\nrequest_retention = 0.85\n",
        )
        .unwrap();

        let config = SrsConfig::load(&path).unwrap();
        assert_eq!(config.card_tag, "flashcard");
        assert_eq!(config.default_deck, "Default");
        assert_eq!(config.scheduler.request_retention, 0.85);
        assert_eq!(config.scheduler.maximum_interval, 36500.0);
        assert_eq!(config.reading.default_priority, 5);
    }

    #[test]
    fn test_maximum_interval_is_bounded() {
        let bounded = |maximum_interval| {
            SchedulerConfig {
                maximum_interval,
                ..SchedulerConfig::default()
            }
            .maximum_interval_days()
        };
        assert_eq!(bounded(1e300), INTERVAL_CEILING_DAYS);
        assert_eq!(bounded(f64::INFINITY), INTERVAL_CEILING_DAYS);
        assert_eq!(bounded(f64::NAN), INTERVAL_CEILING_DAYS);
        assert_eq!(bounded(-5.0), 1.0);
        assert_eq!(bounded(180.0), 180.0);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SrsConfig::load_or_default(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config, SrsConfig::default());
    }

    #[test]
    fn test_short_weight_list_falls_back() {
        let config = SchedulerConfig {
            weights: vec![1.0],
            ..Default::default()
        };
        assert_eq!(config.weight(0), 1.0);
        assert_eq!(config.weight(18), DEFAULT_WEIGHTS[18]);
    }
}
