//! Composition of the gate, pause coordinator and executor

use pacer_config::{ConfigResult, QueueConfig, RetryConfig};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::events::AttemptObserver;
use crate::executor::{ExecutionError, RequestExecutor};
use crate::gate::{GateStats, RateGate};
use crate::pause::PauseCoordinator;
use crate::retry::{AttemptOutcome, RetryPolicy, Retryable};

/// Rate-limited, retrying executor for outbound calls.
///
/// Cloning is cheap and every clone shares the same gate and pause window.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use pacer_config::{QueueConfig, RetryConfig};
/// use pacer_resilience::{AttemptOutcome, Pacer};
///
/// let pacer = Pacer::new(QueueConfig::default(), RetryConfig::default())?;
/// let _value: Result<u32, _> = pacer
///     .execute(|_attempt| async { AttemptOutcome::<_, String>::Success(42) })
///     .await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pacer {
    gate: Arc<RateGate>,
    executor: RequestExecutor,
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("gate", &self.gate)
            .field("executor", &self.executor)
            .finish()
    }
}

impl Pacer {
    /// Create a pacer with its own pause window
    pub fn new(queue: QueueConfig, retry: RetryConfig) -> ConfigResult<Self> {
        Self::builder().queue(queue).retry(retry).build()
    }

    pub fn builder() -> PacerBuilder {
        PacerBuilder::default()
    }

    /// Submit a call; resolves once it has succeeded or failed for good.
    ///
    /// Every attempt, retries included, runs inside the single slot the
    /// gate granted at admission.
    pub async fn execute<F, Fut, T, E>(&self, attempt_fn: F) -> Result<T, ExecutionError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E>>,
        E: fmt::Display,
    {
        self.gate.admit(|| self.executor.run(attempt_fn)).await
    }

    /// Like [`Pacer::execute`] for calls whose errors classify themselves
    pub async fn execute_result<F, Fut, T, E>(&self, mut call: F) -> Result<T, ExecutionError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.execute(|_| {
            let fut = call();
            async move { AttemptOutcome::from(fut.await) }
        })
        .await
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn pause(&self) -> &Arc<PauseCoordinator> {
        self.executor.pause()
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    pub fn stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// Resolve once nothing is queued or running
    pub async fn wait_idle(&self) {
        self.gate.wait_idle().await
    }
}

/// Builder for [`Pacer`]
#[derive(Default)]
pub struct PacerBuilder {
    queue: QueueConfig,
    retry: RetryConfig,
    pause: Option<Arc<PauseCoordinator>>,
    observer: Option<Arc<dyn AttemptObserver>>,
}

impl PacerBuilder {
    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Share an existing pause window, e.g. with another pacer talking to
    /// the same service
    pub fn pause(mut self, pause: Arc<PauseCoordinator>) -> Self {
        self.pause = Some(pause);
        self
    }

    /// Receive per-attempt events instead of the default log output
    pub fn observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> ConfigResult<Pacer> {
        let pause = self.pause.unwrap_or_default();
        let gate = RateGate::new(self.queue, pause.clone())?;
        let mut executor = RequestExecutor::new(RetryPolicy::new(self.retry)?, pause);
        if let Some(observer) = self.observer {
            executor = executor.with_observer(observer);
        }

        Ok(Pacer {
            gate: Arc::new(gate),
            executor,
        })
    }
}
