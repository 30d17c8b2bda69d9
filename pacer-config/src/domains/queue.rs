//! Admission queue configuration

use crate::error::ConfigResult;
use crate::validation::{validate_duration_bound, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate and concurrency limits applied to task admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Length of the rolling window the start cap applies to
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,

    /// Maximum number of task starts within one interval
    #[serde(default = "default_interval_cap")]
    pub interval_cap: u32,

    /// Maximum number of tasks executing at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Reuse concurrency slots freed mid-interval immediately instead of
    /// at the next interval boundary
    #[serde(default = "crate::domains::utils::default_true")]
    pub carryover: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            interval_cap: default_interval_cap(),
            concurrency: default_concurrency(),
            carryover: true,
        }
    }
}

impl QueueConfig {
    /// Config with the given start cap per interval and the default concurrency
    pub fn per_interval(interval_cap: u32, interval: Duration) -> Self {
        Self {
            interval,
            interval_cap,
            ..Self::default()
        }
    }

    /// Builder-style concurrency override
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder-style carryover override
    pub fn with_carryover(mut self, carryover: bool) -> Self {
        self.carryover = carryover;
        self
    }
}

impl Validatable for QueueConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.interval.as_millis(), "interval", self.domain_name())?;
        validate_duration_bound(self.interval, "interval", self.domain_name())?;
        validate_positive(self.interval_cap, "interval_cap", self.domain_name())?;
        validate_positive(self.concurrency, "concurrency", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "queue"
    }
}

// Default value functions
fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_interval_cap() -> u32 {
    1000
}

fn default_concurrency() -> u32 {
    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.interval_cap, 1000);
        assert_eq!(config.concurrency, 40);
        assert!(config.carryover);
    }

    #[test]
    fn test_queue_config_validation() {
        let mut config = QueueConfig::default();
        assert!(config.validate().is_ok());

        config.interval_cap = 0;
        assert!(config.validate().is_err());

        config = QueueConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        config = QueueConfig::default();
        config.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.interval = Duration::from_secs(u64::MAX);
        assert!(config.validate().is_err());

        // Sub-second intervals are fine
        config.interval = Duration::from_millis(250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_config_humantime() {
        let yaml = "interval: 1m 30s\ninterval_cap: 10\nconcurrency: 2\ncarryover: false\n";
        let config: QueueConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.interval, Duration::from_secs(90));
        assert_eq!(config.interval_cap, 10);
        assert_eq!(config.concurrency, 2);
        assert!(!config.carryover);
    }
}
