//! Logging setup for Pacer
//!
//! Library crates emit through `log` and `tracing`; applications call one of
//! the initialisers here once at startup to install a `tracing-subscriber`
//! fmt subscriber. `log` records are forwarded into the same subscriber.

pub mod init;

// Re-export main types for convenience
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use pacer_config::{LogFormat, LogLevel, LoggingConfig};
