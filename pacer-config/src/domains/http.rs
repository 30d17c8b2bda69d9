//! HTTP client configuration

use crate::error::ConfigResult;
use crate::validation::{
    validate_duration_bound, validate_header_name, validate_positive, validate_required_string,
    Validatable,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-attempt request timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Status code the remote service uses to signal rate limiting
    #[serde(default = "default_rate_limit_status")]
    pub rate_limit_status: u16,

    /// Strategies used to read the resume hint from a rate-limited
    /// response, tried in order
    #[serde(default = "default_resume_hints")]
    pub resume_hints: Vec<ResumeHintStrategy>,

    /// Resume hint used when no strategy yields a value
    #[serde(with = "humantime_serde", default = "default_fallback_resume")]
    pub fallback_resume: Duration,

    /// Longest pause a server hint may impose; larger hints are clamped
    #[serde(with = "humantime_serde", default = "default_max_resume")]
    pub max_resume: Duration,
}

/// How the "try again after" hint is derived from response metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResumeHintStrategy {
    /// Header holding a relative delay: an integer number of seconds
    /// (`Retry-After: 3`) or an HTTP date
    RelativeSeconds { header: String },

    /// Header holding the absolute unix epoch second at which the limit resets
    EpochReset { header: String },

    /// Ignore response metadata and use the fixed fallback
    Fixed,
}

impl ResumeHintStrategy {
    /// Relative-seconds strategy for the given header
    pub fn relative(header: impl Into<String>) -> Self {
        ResumeHintStrategy::RelativeSeconds {
            header: header.into(),
        }
    }

    /// Epoch-reset strategy for the given header
    pub fn epoch(header: impl Into<String>) -> Self {
        ResumeHintStrategy::EpochReset {
            header: header.into(),
        }
    }

    /// Header this strategy reads, if any
    pub fn header(&self) -> Option<&str> {
        match self {
            ResumeHintStrategy::RelativeSeconds { header }
            | ResumeHintStrategy::EpochReset { header } => Some(header),
            ResumeHintStrategy::Fixed => None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            rate_limit_status: default_rate_limit_status(),
            resume_hints: default_resume_hints(),
            fallback_resume: default_fallback_resume(),
            max_resume: default_max_resume(),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.timeout.as_millis(), "timeout", self.domain_name())?;
        validate_duration_bound(self.timeout, "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;

        if !(400..=599).contains(&self.rate_limit_status) {
            return Err(self.validation_error(format!(
                "rate_limit_status must be an HTTP error status, got {}",
                self.rate_limit_status
            )));
        }

        validate_positive(self.max_resume.as_millis(), "max_resume", self.domain_name())?;
        validate_duration_bound(self.max_resume, "max_resume", self.domain_name())?;
        if self.fallback_resume > self.max_resume {
            return Err(self.validation_error(format!(
                "fallback_resume ({:?}) must not exceed max_resume ({:?})",
                self.fallback_resume, self.max_resume
            )));
        }

        for strategy in &self.resume_hints {
            strategy.validate()?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

impl Validatable for ResumeHintStrategy {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(header) = self.header() {
            validate_header_name(header, "header", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http.resume_hints"
    }
}

// Default value functions
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("pacer/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_rate_limit_status() -> u16 {
    429
}

fn default_resume_hints() -> Vec<ResumeHintStrategy> {
    vec![
        ResumeHintStrategy::relative("x-ratelimit-reset"),
        ResumeHintStrategy::relative("retry-after"),
    ]
}

fn default_fallback_resume() -> Duration {
    Duration::from_secs(3)
}

fn default_max_resume() -> Duration {
    Duration::from_secs(60 * 60)
}
