//! Per-attempt observability events

use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

use crate::retry::OutcomeKind;

/// What happened on one attempt of a logical call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptEvent {
    /// 1-indexed attempt number
    pub attempt: u32,
    /// Attempts the policy allows in total
    pub max_attempts: u32,
    /// Attempts still available after this one
    pub retries_left: u32,
    pub outcome: OutcomeKind,
    /// Delay before the next attempt, when one will follow
    #[serde(rename = "delay_ms", serialize_with = "serialize_millis")]
    pub delay: Option<Duration>,
    /// Whether this attempt ended the call
    pub terminal: bool,
    /// Rendered failure cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn serialize_millis<S>(delay: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match delay {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

impl AttemptEvent {
    pub fn is_failure(&self) -> bool {
        self.outcome != OutcomeKind::Success
    }
}

/// Receives attempt events from the executor
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent);
}

impl<F> AttemptObserver for F
where
    F: Fn(&AttemptEvent) + Send + Sync,
{
    fn on_attempt(&self, event: &AttemptEvent) {
        self(event)
    }
}

/// Default observer: writes one log record per attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl AttemptObserver for LogObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        let cause = event.message.as_deref().unwrap_or("");
        match (event.outcome, event.terminal) {
            (OutcomeKind::Success, _) => {
                debug!("Attempt {} succeeded", event.attempt);
            }
            (OutcomeKind::Fatal, _) => {
                error!("Attempt {} failed with non-retryable error: {}", event.attempt, cause);
            }
            (outcome, true) => {
                error!(
                    "Attempt {} failed ({}); no retries left: {}",
                    event.attempt, outcome, cause
                );
            }
            (outcome, false) => {
                warn!(
                    "Attempt {} failed ({}); {} retries left, next in {:?}: {}",
                    event.attempt,
                    outcome,
                    event.retries_left,
                    event.delay.unwrap_or_default(),
                    cause
                );
            }
        }
    }
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AttemptEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events.lock().clone()
    }

    pub fn failures(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_failure()).count()
    }
}

impl AttemptObserver for RecordingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        self.events.lock().push(event.clone());
    }
}
