//! Attempt outcomes and the retry policy

use pacer_config::{ConfigResult, RetryConfig, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffCalculator;

/// Classified result of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T, E> {
    /// The call produced a usable value
    Success(T),

    /// The remote service rejected the call because of rate limiting
    RateLimited {
        /// Server-provided "try again after" hint
        resume_hint: Option<Duration>,
        cause: E,
    },

    /// A failure that may go away on its own (network error, 5xx)
    Transient(E),

    /// A failure that retrying cannot fix
    Fatal(E),
}

/// Outcome discriminant without payload, used for events and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    RateLimited,
    Transient,
    Fatal,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::RateLimited => write!(f, "rate-limited"),
            OutcomeKind::Transient => write!(f, "transient"),
            OutcomeKind::Fatal => write!(f, "fatal"),
        }
    }
}

impl<T, E> AttemptOutcome<T, E> {
    /// Rate-limited outcome with a server hint
    pub fn rate_limited(cause: E, resume_hint: Option<Duration>) -> Self {
        AttemptOutcome::RateLimited { resume_hint, cause }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            AttemptOutcome::Success(_) => OutcomeKind::Success,
            AttemptOutcome::RateLimited { .. } => OutcomeKind::RateLimited,
            AttemptOutcome::Transient(_) => OutcomeKind::Transient,
            AttemptOutcome::Fatal(_) => OutcomeKind::Fatal,
        }
    }

    /// Whether the policy may retry this outcome at all
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::RateLimited { .. } | AttemptOutcome::Transient(_)
        )
    }

    /// Server-provided resume hint, only present on rate-limited outcomes
    pub fn resume_hint(&self) -> Option<Duration> {
        match self {
            AttemptOutcome::RateLimited { resume_hint, .. } => *resume_hint,
            _ => None,
        }
    }

    /// Borrow the failure cause, if this is a failure
    pub fn cause(&self) -> Option<&E> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::RateLimited { cause, .. }
            | AttemptOutcome::Transient(cause)
            | AttemptOutcome::Fatal(cause) => Some(cause),
        }
    }

    /// Split into the success value or the failure cause
    pub fn into_result(self) -> Result<T, E> {
        match self {
            AttemptOutcome::Success(value) => Ok(value),
            AttemptOutcome::RateLimited { cause, .. }
            | AttemptOutcome::Transient(cause)
            | AttemptOutcome::Fatal(cause) => Err(cause),
        }
    }
}

/// Trait for errors that can classify themselves for retrying
pub trait Retryable {
    /// Whether this error is retryable
    fn is_retryable(&self) -> bool;

    /// Whether this error is a rate-limit rejection
    fn is_rate_limited(&self) -> bool {
        false
    }

    /// Server-provided delay before the next attempt
    fn retry_delay(&self) -> Option<Duration> {
        None
    }
}

impl<T, E: Retryable> From<Result<T, E>> for AttemptOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(error) if error.is_rate_limited() => AttemptOutcome::RateLimited {
                resume_hint: error.retry_delay(),
                cause: error,
            },
            Err(error) if error.is_retryable() => AttemptOutcome::Transient(error),
            Err(error) => AttemptOutcome::Fatal(error),
        }
    }
}

/// Retry policy: decides whether to retry and how long to wait
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    backoff: BackoffCalculator,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_validated(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy from a configuration, validating it first
    pub fn new(config: RetryConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: RetryConfig) -> Self {
        let backoff = BackoffCalculator::new(
            config.base_delay,
            config.factor,
            config.max_delay,
            config.jitter,
        );
        Self { config, backoff }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Number of attempts a task gets, including the first
    pub fn max_attempts(&self) -> u32 {
        self.config.effective_attempts()
    }

    /// Attempts still available after `attempts_so_far`
    pub fn retries_left(&self, attempts_so_far: u32) -> u32 {
        self.max_attempts().saturating_sub(attempts_so_far)
    }

    /// Overall time budget for one logical call
    pub fn deadline(&self) -> Option<Duration> {
        self.config.deadline
    }

    /// Whether another attempt should follow `outcome`.
    ///
    /// True iff fewer than `max_attempts` attempts were made and the
    /// outcome is rate-limited or transient.
    pub fn should_retry<T, E>(&self, outcome: &AttemptOutcome<T, E>, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts() && outcome.is_retryable()
    }

    /// Delay before the attempt following `attempts_so_far` failed attempts.
    ///
    /// A server resume hint on the outcome wins over the computed backoff.
    pub fn delay_for<T, E>(&self, attempts_so_far: u32, outcome: &AttemptOutcome<T, E>) -> Duration {
        outcome
            .resume_hint()
            .unwrap_or_else(|| self.backoff_delay(attempts_so_far))
    }

    /// Computed exponential delay, ignoring any server hint
    pub fn backoff_delay(&self, attempts_so_far: u32) -> Duration {
        self.backoff.calculate_delay(attempts_so_far)
    }
}
