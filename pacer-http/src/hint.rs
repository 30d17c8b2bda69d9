//! Resume-hint extraction from rate-limited responses
//!
//! Services signal when a rate limit resets in different ways: a relative
//! `Retry-After`/`X-RateLimit-Reset` seconds count, an HTTP date, or an
//! absolute epoch second. [`ResumeHintParser`] tries the configured
//! [`ResumeHintStrategy`] list in order and falls back to a fixed delay.
//! Hints longer than the configured maximum are clamped to it.

use chrono::{DateTime, Utc};
use pacer_config::{HttpConfig, ResumeHintStrategy};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Ordered resume-hint strategies plus the fallback delay
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeHintParser {
    strategies: Vec<ResumeHintStrategy>,
    fallback: Duration,
    max: Duration,
}

impl Default for ResumeHintParser {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl ResumeHintParser {
    pub fn new(strategies: Vec<ResumeHintStrategy>, fallback: Duration) -> Self {
        Self {
            strategies,
            fallback,
            max: HttpConfig::default().max_resume,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.resume_hints.clone(), config.fallback_resume)
            .with_max_resume(config.max_resume)
    }

    /// Upper bound applied to every hint, the fallback included
    pub fn with_max_resume(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn fallback(&self) -> Duration {
        self.fallback.min(self.max)
    }

    pub fn max_resume(&self) -> Duration {
        self.max
    }

    /// Resume hint for a rate-limited response received now
    pub fn parse(&self, headers: &HeaderMap) -> Duration {
        self.parse_at(headers, Utc::now())
    }

    /// Resume hint relative to `now`; the first strategy yielding a value wins
    pub fn parse_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
        for strategy in &self.strategies {
            let hint = match strategy {
                ResumeHintStrategy::RelativeSeconds { header } => {
                    header_str(headers, header).and_then(|value| parse_relative(value, now))
                }
                ResumeHintStrategy::EpochReset { header } => {
                    header_str(headers, header).and_then(|value| parse_epoch(value, now))
                }
                ResumeHintStrategy::Fixed => Some(self.fallback),
            };

            if let Some(hint) = hint {
                if hint > self.max {
                    warn!(
                        "Resume hint {:?} from {:?} exceeds {:?}; clamping",
                        hint, strategy, self.max
                    );
                    return self.max;
                }
                debug!("Resume hint {:?} from {:?}", hint, strategy);
                return hint;
            }
        }

        trace!("No resume hint found, using fallback {:?}", self.fallback);
        self.fallback()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Seconds from now (integer or fractional), or an HTTP date
fn parse_relative(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(until(at.with_timezone(&Utc), now))
}

/// Absolute unix epoch second at which the limit resets
fn parse_epoch(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let secs = value.parse::<i64>().ok()?;
    let at = DateTime::<Utc>::from_timestamp(secs, 0)?;
    Some(until(at, now))
}

/// Time from `now` until `at`; zero if `at` already passed
fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
