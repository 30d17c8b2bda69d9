//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Pacer configuration combining all domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PacerConfig {
    /// Admission rate and concurrency limits
    #[serde(default)]
    pub queue: queue::QueueConfig,

    /// Retry and backoff policy
    #[serde(default)]
    pub retry: retry::RetryConfig,

    /// HTTP client and rate-limit signal handling
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl PacerConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.queue.validate()?;
        self.retry.validate()?;
        self.http.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = PacerConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
