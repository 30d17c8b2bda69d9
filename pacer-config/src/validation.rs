//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;

/// Longest duration any configured timing value may take
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate that `value` is not below `minimum`
pub fn validate_at_least<T>(value: T, minimum: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < minimum {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be at least {}, got {}", field_name, minimum, value),
        });
    }
    Ok(())
}

/// Validate an HTTP header name (RFC 7230 token characters)
pub fn validate_header_name(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(value, field_name, domain)?;

    let is_token = value.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
    });

    if !is_token {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} '{}' is not a valid header name", field_name, value),
        });
    }

    Ok(())
}

/// Validate that a duration does not exceed [`MAX_DURATION`]
pub fn validate_duration_bound(value: Duration, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value > MAX_DURATION {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} must not exceed {:?}, got {:?}",
                field_name, MAX_DURATION, value
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u32, "cap", "queue").is_ok());
        assert!(validate_positive(0u32, "cap", "queue").is_err());
        assert!(validate_positive(0.5f64, "factor", "retry").is_ok());
    }

    #[test]
    fn test_validate_at_least() {
        assert!(validate_at_least(1.0, 1.0, "factor", "retry").is_ok());
        assert!(validate_at_least(2.5, 1.0, "factor", "retry").is_ok());

        let err = validate_at_least(0.5, 1.0, "factor", "retry").unwrap_err();
        assert!(err.to_string().contains("factor must be at least 1"));
    }

    #[test]
    fn test_validate_duration_bound() {
        assert!(validate_duration_bound(Duration::from_secs(60), "interval", "queue").is_ok());
        assert!(validate_duration_bound(MAX_DURATION, "interval", "queue").is_ok());

        let err = validate_duration_bound(Duration::MAX, "interval", "queue").unwrap_err();
        assert!(err.to_string().contains("interval must not exceed"));
    }

    #[test]
    fn test_validate_header_name() {
        assert!(validate_header_name("X-RateLimit-Reset", "header", "http").is_ok());
        assert!(validate_header_name("retry-after", "header", "http").is_ok());
        assert!(validate_header_name("", "header", "http").is_err());
        assert!(validate_header_name("bad header", "header", "http").is_err());
        assert!(validate_header_name("bad:header", "header", "http").is_err());
    }
}
