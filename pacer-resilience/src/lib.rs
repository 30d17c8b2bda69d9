//! Outbound call admission and resilience for Pacer
//!
//! This crate bounds how fast and how many calls start ([`RateGate`]),
//! shares server-signaled rate-limit pauses between callers
//! ([`PauseCoordinator`]) and retries failed attempts with exponential
//! backoff ([`RetryPolicy`], [`RequestExecutor`]). [`Pacer`] composes them.

pub mod backoff;
pub mod clock;
pub mod events;
pub mod executor;
pub mod gate;
pub mod pacer;
pub mod pause;
pub mod retry;

// Re-export commonly used types
pub use backoff::BackoffCalculator;
pub use events::{AttemptEvent, AttemptObserver, LogObserver, RecordingObserver};
pub use executor::{ExecutionError, RequestExecutor};
pub use gate::{GateStats, RateGate, SlotGuard};
pub use pacer::{Pacer, PacerBuilder};
pub use pause::{PauseCoordinator, PauseStats};
pub use retry::{AttemptOutcome, OutcomeKind, RetryPolicy, Retryable};
