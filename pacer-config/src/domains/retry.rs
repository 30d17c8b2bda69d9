//! Retry and backoff configuration

use crate::error::ConfigResult;
use crate::validation::{validate_at_least, validate_duration_bound, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    ///
    /// Zero behaves like one: a task is always tried at least once.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    pub base_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Upper bound for any computed backoff delay
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Whether to add +-20% jitter to computed delays
    #[serde(default = "crate::domains::utils::default_false")]
    pub jitter: bool,

    /// Overall time budget for one logical call, measured from its first attempt
    #[serde(
        with = "humantime_serde::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            factor: default_factor(),
            max_delay: default_max_delay(),
            jitter: false,
            deadline: None,
        }
    }
}

impl RetryConfig {
    /// Config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Number of attempts that will actually be made
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.factor.is_finite() {
            return Err(self.validation_error("factor must be a finite number"));
        }
        validate_at_least(self.factor, 1.0, "factor", self.domain_name())?;

        validate_duration_bound(self.max_delay, "max_delay", self.domain_name())?;

        if self.max_delay < self.base_delay {
            return Err(self.validation_error(format!(
                "max_delay ({:?}) must not be smaller than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }

        if let Some(deadline) = self.deadline {
            if deadline.is_zero() {
                return Err(self.validation_error("deadline must be greater than 0"));
            }
            validate_duration_bound(deadline, "deadline", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}

// Default value functions
fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}
