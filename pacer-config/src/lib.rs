//! Domain-driven configuration management for Pacer
//!
//! Configuration is split by functional domain (admission queue, retry,
//! HTTP, logging), with validation, defaults, and environment variable
//! overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    http::{HttpConfig, ResumeHintStrategy},
    logging::{LogFormat, LogLevel, LoggingConfig},
    queue::QueueConfig,
    retry::RetryConfig,
    PacerConfig,
};
