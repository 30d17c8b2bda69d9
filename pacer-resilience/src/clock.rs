//! Overflow-safe instant arithmetic

use std::time::Duration;
use tokio::time::Instant;

/// Horizon used when `instant + duration` would not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `at + by`, or a point roughly thirty years out when the sum overflows
pub fn saturating_add(at: Instant, by: Duration) -> Instant {
    at.checked_add(by)
        .or_else(|| at.checked_add(FAR_FUTURE))
        .unwrap_or(at)
}
