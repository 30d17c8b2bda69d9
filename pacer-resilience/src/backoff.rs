//! Exponential backoff for retry policies

use rand::Rng;
use std::time::Duration;

/// Exponential backoff delay calculator
///
/// The delay after the n-th failed attempt (1-indexed) is
/// `base_delay * factor^(n - 1)`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    base_delay: Duration,
    factor: f64,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    /// Create a new backoff calculator
    pub fn new(base_delay: Duration, factor: f64, max_delay: Duration, jitter: bool) -> Self {
        Self {
            base_delay,
            factor,
            max_delay,
            jitter,
        }
    }

    /// Calculate delay for a specific attempt (1-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped_delay = self.calculate_base_delay(attempt).min(self.max_delay);

        if self.jitter {
            self.add_jitter(capped_delay).min(self.max_delay)
        } else {
            capped_delay
        }
    }

    fn calculate_base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let multiplier = self.factor.powi(exponent);

        // Overflow (inf) or nonsense factors saturate to the cap
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * multiplier)
            .unwrap_or(self.max_delay)
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();

        // Add +-20% jitter
        let jitter_factor = rng.gen_range(0.8..1.2);
        delay.mul_f64(jitter_factor)
    }

    /// Upper bound of any delay this calculator returns
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}
