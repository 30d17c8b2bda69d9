//! Attempt loop for one logical call

use log::debug;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};

use crate::clock::saturating_add;
use crate::events::{AttemptEvent, AttemptObserver, LogObserver};
use crate::pause::PauseCoordinator;
use crate::retry::{AttemptOutcome, OutcomeKind, RetryPolicy};

/// Terminal failure of a logical call
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError<E> {
    /// Every allowed attempt failed with a retryable error
    #[error("Gave up after {attempts} attempts. Last error: {cause}")]
    Exhausted { attempts: u32, cause: E },

    /// An attempt failed with an error retrying cannot fix
    #[error("Non-retryable error on attempt {attempt}: {cause}")]
    Fatal { attempt: u32, cause: E },

    /// The overall time budget ran out
    #[error("Deadline of {deadline:?} exceeded after {attempts} attempts")]
    DeadlineExceeded {
        attempts: u32,
        deadline: Duration,
        /// Last completed failure, if any attempt finished before the deadline
        cause: Option<E>,
    },
}

impl<E> ExecutionError<E> {
    /// Number of attempts started before the call ended
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionError::Exhausted { attempts, .. }
            | ExecutionError::DeadlineExceeded { attempts, .. } => *attempts,
            ExecutionError::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn cause(&self) -> Option<&E> {
        match self {
            ExecutionError::Exhausted { cause, .. } | ExecutionError::Fatal { cause, .. } => {
                Some(cause)
            }
            ExecutionError::DeadlineExceeded { cause, .. } => cause.as_ref(),
        }
    }

    /// Get the underlying error if present
    pub fn into_cause(self) -> Option<E> {
        match self {
            ExecutionError::Exhausted { cause, .. } | ExecutionError::Fatal { cause, .. } => {
                Some(cause)
            }
            ExecutionError::DeadlineExceeded { cause, .. } => cause,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutionError::Fatal { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ExecutionError::DeadlineExceeded { .. })
    }
}

/// Drives attempts of one call through the pause window and retry policy
#[derive(Clone)]
pub struct RequestExecutor {
    policy: RetryPolicy,
    pause: Arc<PauseCoordinator>,
    observer: Arc<dyn AttemptObserver>,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .field("pause", &self.pause)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Create an executor that reports attempts through the log
    pub fn new(policy: RetryPolicy, pause: Arc<PauseCoordinator>) -> Self {
        Self {
            policy,
            pause,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replace the attempt observer
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pause(&self) -> &Arc<PauseCoordinator> {
        &self.pause
    }

    /// Run attempts until one succeeds, one is fatal, retries run out or
    /// the deadline passes. `attempt_fn` receives the 1-indexed attempt.
    pub async fn run<F, Fut, T, E>(&self, mut attempt_fn: F) -> Result<T, ExecutionError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E>>,
        E: fmt::Display,
    {
        let started = Instant::now();
        let deadline = self.policy.deadline();
        let deadline_at = deadline.map(|d| saturating_add(started, d));
        let max_attempts = self.policy.max_attempts();
        let mut last_cause: Option<E> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Executing attempt {} of {}", attempt, max_attempts);

            let call = async {
                self.pause.wait_if_paused().await;
                attempt_fn(attempt).await
            };

            let outcome = match deadline_at {
                Some(at) => match timeout_at(at, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let error = ExecutionError::DeadlineExceeded {
                            attempts: attempt,
                            deadline: deadline.unwrap_or_default(),
                            cause: last_cause,
                        };
                        self.emit_deadline(attempt, &error);
                        return Err(error);
                    }
                },
                None => call.await,
            };

            if let AttemptOutcome::RateLimited { resume_hint, .. } = &outcome {
                let window = resume_hint.unwrap_or_else(|| self.policy.backoff_delay(attempt));
                self.pause.arm(window);
            }

            let kind = outcome.kind();
            let retry = self.policy.should_retry(&outcome, attempt);
            let delay = self.policy.delay_for(attempt, &outcome);

            let cause = match outcome.into_result() {
                Ok(value) => {
                    self.emit(attempt, kind, None, true, None);
                    return Ok(value);
                }
                Err(cause) => cause,
            };

            if kind == OutcomeKind::Fatal {
                self.emit(attempt, kind, None, true, Some(cause.to_string()));
                return Err(ExecutionError::Fatal { attempt, cause });
            }

            if !retry {
                self.emit(attempt, kind, None, true, Some(cause.to_string()));
                return Err(ExecutionError::Exhausted {
                    attempts: attempt,
                    cause,
                });
            }

            if let Some(at) = deadline_at {
                if saturating_add(Instant::now(), delay) > at {
                    self.emit(attempt, kind, None, true, Some(cause.to_string()));
                    return Err(ExecutionError::DeadlineExceeded {
                        attempts: attempt,
                        deadline: deadline.unwrap_or_default(),
                        cause: Some(cause),
                    });
                }
            }

            self.emit(attempt, kind, Some(delay), false, Some(cause.to_string()));
            last_cause = Some(cause);
            sleep(delay).await;
        }
    }

    fn emit(
        &self,
        attempt: u32,
        outcome: OutcomeKind,
        delay: Option<Duration>,
        terminal: bool,
        message: Option<String>,
    ) {
        self.observer.on_attempt(&AttemptEvent {
            attempt,
            max_attempts: self.policy.max_attempts(),
            retries_left: self.policy.retries_left(attempt),
            outcome,
            delay,
            terminal,
            message,
        });
    }

    fn emit_deadline<E: fmt::Display>(&self, attempt: u32, error: &ExecutionError<E>) {
        self.emit(
            attempt,
            OutcomeKind::Transient,
            None,
            true,
            Some(error.to_string()),
        );
    }
}
