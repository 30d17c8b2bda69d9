//! HTTP client functionality for Pacer
//!
//! This crate puts reqwest requests behind a [`pacer_resilience::Pacer`]:
//! responses are classified into attempt outcomes, 429 responses yield a
//! resume hint that pauses every request sharing the pacer, and failed
//! attempts are retried with backoff.

pub mod classify;
pub mod client;
pub mod errors;
pub mod hint;

// Re-export main types for convenience
pub use classify::{FatalPredicate, ResponseClassifier};
pub use client::{classify_response, execute, RateLimitedClient};
pub use errors::{is_fatal_by_default, HttpError};
pub use hint::ResumeHintParser;
