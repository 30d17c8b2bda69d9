//! Shared pause window driven by server rate-limit signals
//!
//! When one caller learns that the remote service is rate limiting, every
//! other caller sharing the same coordinator stops starting new work until
//! the server's reset time has passed. The window only ever grows while it
//! is active; it is cleared by whichever waiter first observes that it has
//! elapsed.

use crate::clock::saturating_add;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Counters describing how the pause window has been driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseStats {
    /// Windows installed while no pause was active
    pub armed: u64,
    /// Active windows pushed further out
    pub extended: u64,
    /// Arm requests that would have shortened an active window
    pub ignored: u64,
    /// Windows cleared after elapsing
    pub cleared: u64,
}

/// Process-wide pause state, shared by `Arc`
#[derive(Debug, Default)]
pub struct PauseCoordinator {
    window: Mutex<Option<Instant>>,
    armed: AtomicU64,
    extended: AtomicU64,
    ignored: AtomicU64,
    cleared: AtomicU64,
}

impl PauseCoordinator {
    /// Create an inactive coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause admissions for `duration` from now.
    ///
    /// Installs the window if no pause is active or if it ends later than
    /// the active one; a shorter or equal window is ignored. Returns whether
    /// the window changed.
    pub fn arm(&self, duration: Duration) -> bool {
        let now = Instant::now();
        let candidate = saturating_add(now, duration);
        let mut window = self.window.lock();

        match *window {
            Some(end) if end >= candidate => {
                self.ignored.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Pause of {:?} ignored; active pause ends in {:?}",
                    duration,
                    end.saturating_duration_since(now)
                );
                false
            }
            Some(end) if end > now => {
                *window = Some(candidate);
                self.extended.fetch_add(1, Ordering::Relaxed);
                info!("Rate-limit pause extended to {:?} from now", duration);
                true
            }
            _ => {
                *window = Some(candidate);
                self.armed.fetch_add(1, Ordering::Relaxed);
                info!("Rate-limit pause armed for {:?}", duration);
                true
            }
        }
    }

    /// Suspend while a pause is active.
    ///
    /// Extensions made during the wait are honored. The caller that finds
    /// the elapsed deadline still installed clears it; everyone else just
    /// returns.
    pub async fn wait_if_paused(&self) {
        loop {
            let end = match *self.window.lock() {
                Some(end) => end,
                None => return,
            };

            if Instant::now() >= end {
                if self.clear_if_elapsed(end) {
                    return;
                }
                // Re-armed or cleared by someone else; look again
                continue;
            }

            sleep_until(end).await;
        }
    }

    /// Clear the window only if it is still exactly `observed`
    fn clear_if_elapsed(&self, observed: Instant) -> bool {
        let mut window = self.window.lock();
        if *window == Some(observed) {
            *window = None;
            self.cleared.fetch_add(1, Ordering::Relaxed);
            info!("Rate-limit pause cleared");
            true
        } else {
            false
        }
    }

    /// Whether a pause is currently in force
    pub fn is_paused(&self) -> bool {
        self.paused_until().is_some()
    }

    /// End of the active pause, if one is in force
    pub fn paused_until(&self) -> Option<Instant> {
        let now = Instant::now();
        let window = *self.window.lock();
        window.filter(|end| *end > now)
    }

    /// Time left in the active pause
    pub fn remaining(&self) -> Option<Duration> {
        self.paused_until()
            .map(|end| end.saturating_duration_since(Instant::now()))
    }

    pub fn stats(&self) -> PauseStats {
        PauseStats {
            armed: self.armed.load(Ordering::Relaxed),
            extended: self.extended.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
        }
    }
}
