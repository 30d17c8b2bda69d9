//! Rate- and concurrency-bounded task admission
//!
//! A [`RateGate`] decides when queued tasks may *start*. Two independent
//! limits apply:
//!
//! - at most `interval_cap` starts within any rolling `interval`
//! - at most `concurrency` tasks running at once
//!
//! Admission is FIFO: the queue head holds a fair async lock while it waits
//! for capacity, so later submissions cannot overtake it. While the shared
//! [`PauseCoordinator`] reports a pause no task starts, but running tasks are
//! left alone.
//!
//! With `carryover` enabled a slot freed mid-interval can be reused straight
//! away. Without it the slot only returns to the pool at the next interval
//! boundary (boundaries are multiples of `interval` from gate creation).

use log::{debug, trace};
use pacer_config::{ConfigResult, QueueConfig, Validatable};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

use crate::clock::saturating_add;
use crate::pause::PauseCoordinator;

/// Point-in-time view of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
    /// Tasks submitted but not yet started
    pub queued: usize,
    /// Tasks currently executing
    pub running: u32,
    /// Starts inside the current rolling window
    pub starts_in_window: usize,
    /// Freed slots waiting for the next interval boundary
    pub deferred_slots: usize,
    /// Starts since the gate was created
    pub total_started: u64,
    /// Whether a shared pause is in force
    pub paused: bool,
}

/// Admission gate bounding start rate and concurrency
#[derive(Debug)]
pub struct RateGate {
    config: QueueConfig,
    pause: Arc<PauseCoordinator>,
    state: Mutex<GateState>,
    /// Fair lock held by the queue head while it waits for capacity
    admission: tokio::sync::Mutex<()>,
    slot_freed: Notify,
    idle: Notify,
    queued: AtomicUsize,
    epoch: Instant,
}

#[derive(Debug, Default)]
struct GateState {
    running: u32,
    /// Start instants inside the rolling window, oldest first
    starts: VecDeque<Instant>,
    /// Instants at which deferred slots return to the pool, earliest first
    deferred: VecDeque<Instant>,
    total_started: u64,
}

impl GateState {
    fn expire(&mut self, now: Instant, interval: Duration) {
        while let Some(&start) = self.starts.front() {
            if now.saturating_duration_since(start) >= interval {
                self.starts.pop_front();
            } else {
                break;
            }
        }

        while let Some(&release) = self.deferred.front() {
            if release <= now {
                self.deferred.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a start if both limits allow it.
    ///
    /// On refusal returns the instant at which the timing constraints are
    /// next expected to change, or `None` if only a running task finishing
    /// can unblock the gate.
    fn try_start(&mut self, now: Instant, config: &QueueConfig) -> Result<(), Option<Instant>> {
        self.expire(now, config.interval);

        let mut blocked = false;
        let mut wake_at = None;

        if self.starts.len() >= config.interval_cap as usize {
            blocked = true;
            wake_at = self
                .starts
                .front()
                .map(|start| saturating_add(*start, config.interval));
        }

        if self.running as usize + self.deferred.len() >= config.concurrency as usize {
            blocked = true;
            if let Some(&release) = self.deferred.front() {
                wake_at = Some(wake_at.map_or(release, |at: Instant| at.max(release)));
            }
        }

        if blocked {
            return Err(wake_at);
        }

        self.starts.push_back(now);
        self.running += 1;
        self.total_started += 1;
        Ok(())
    }
}

impl RateGate {
    /// Create a gate; fails if the queue configuration is invalid
    pub fn new(config: QueueConfig, pause: Arc<PauseCoordinator>) -> ConfigResult<Self> {
        config.validate()?;

        let window_capacity = (config.interval_cap as usize).min(1024);
        Ok(Self {
            state: Mutex::new(GateState {
                starts: VecDeque::with_capacity(window_capacity),
                ..GateState::default()
            }),
            config,
            pause,
            admission: tokio::sync::Mutex::new(()),
            slot_freed: Notify::new(),
            idle: Notify::new(),
            queued: AtomicUsize::new(0),
            epoch: Instant::now(),
        })
    }

    /// Run `task` once the gate admits it.
    ///
    /// Resolves with the task's own output once it has completed; the gate
    /// itself never fails.
    pub async fn admit<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = self.acquire().await;
        task().await
    }

    /// Wait for admission and hold the slot until the guard is dropped
    pub async fn acquire(&self) -> SlotGuard<'_> {
        let _queued = QueuedGuard::new(self);
        let _head = self.admission.lock().await;

        loop {
            self.pause.wait_if_paused().await;
            if self.pause.is_paused() {
                continue;
            }

            // Register before inspecting state so a release in between is not lost
            let notified = self.slot_freed.notified();
            let now = Instant::now();
            let decision = self.state.lock().try_start(now, &self.config);

            match decision {
                Ok(()) => break,
                Err(Some(wake_at)) => {
                    trace!(
                        "Admission blocked for up to {:?}",
                        wake_at.saturating_duration_since(now)
                    );
                    tokio::select! {
                        _ = sleep_until(wake_at) => {}
                        _ = notified => {}
                    }
                }
                Err(None) => {
                    trace!("Admission blocked until a running task finishes");
                    notified.await;
                }
            }
        }

        debug!("Task admitted ({} running)", self.running());
        SlotGuard { gate: self }
    }

    fn release(&self) {
        let now = Instant::now();
        {
            let mut state = self.state.lock();
            state.running = state.running.saturating_sub(1);
            if !self.config.carryover {
                let boundary = self.next_boundary(now);
                state.deferred.push_back(boundary);
            }
        }

        self.slot_freed.notify_one();
        self.notify_if_idle();
    }

    /// First interval boundary strictly after `now`
    fn next_boundary(&self, now: Instant) -> Instant {
        let interval = self.config.interval.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        let intervals = elapsed / interval + 1;
        let offset = u64::try_from(intervals * interval).unwrap_or(u64::MAX);
        saturating_add(self.epoch, Duration::from_nanos(offset))
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }

    /// Nothing queued and nothing running
    pub fn is_idle(&self) -> bool {
        self.queued() == 0 && self.running() == 0
    }

    /// Resolve once the gate has no queued or running tasks
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Tasks waiting for admission
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Tasks currently executing
    pub fn running(&self) -> u32 {
        self.state.lock().running
    }

    pub fn stats(&self) -> GateStats {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.expire(now, self.config.interval);

        GateStats {
            queued: self.queued(),
            running: state.running,
            starts_in_window: state.starts.len(),
            deferred_slots: state.deferred.len(),
            total_started: state.total_started,
            paused: self.pause.is_paused(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn pause(&self) -> &Arc<PauseCoordinator> {
        &self.pause
    }
}

/// Concurrency slot held by an admitted task; released on drop
#[derive(Debug)]
pub struct SlotGuard<'a> {
    gate: &'a RateGate,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

struct QueuedGuard<'a> {
    gate: &'a RateGate,
}

impl<'a> QueuedGuard<'a> {
    fn new(gate: &'a RateGate) -> Self {
        gate.queued.fetch_add(1, Ordering::SeqCst);
        Self { gate }
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.gate.queued.fetch_sub(1, Ordering::SeqCst);
        self.gate.notify_if_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicU32;

    fn gate(interval: Duration, interval_cap: u32, concurrency: u32, carryover: bool) -> RateGate {
        let config = QueueConfig {
            interval,
            interval_cap,
            concurrency,
            carryover,
        };
        RateGate::new(config, Arc::new(PauseCoordinator::new())).unwrap()
    }

    /// Admit one task per entry of `work`, each sleeping that long.
    /// Returns start instants in submission order and the peak concurrency.
    async fn run_workload(gate: &RateGate, work: &[Duration]) -> (Vec<Instant>, u32) {
        let running = AtomicU32::new(0);
        let peak = AtomicU32::new(0);

        let starts = join_all(work.iter().map(|&busy| {
            let running = &running;
            let peak = &peak;
            gate.admit(move || async move {
                let started = Instant::now();
                let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now_running, Ordering::SeqCst);
                if !busy.is_zero() {
                    tokio::time::sleep(busy).await;
                }
                running.fetch_sub(1, Ordering::SeqCst);
                started
            })
        }))
        .await;

        (starts, peak.load(Ordering::SeqCst))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let pause = Arc::new(PauseCoordinator::new());
        let config = QueueConfig {
            interval_cap: 0,
            ..QueueConfig::default()
        };
        assert!(RateGate::new(config, pause.clone()).is_err());

        let config = QueueConfig {
            concurrency: 0,
            ..QueueConfig::default()
        };
        assert!(RateGate::new(config, pause).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_immediately_under_limits() {
        let gate = gate(Duration::from_secs(1), 10, 4, true);
        let start = Instant::now();

        let value = gate.admit(|| async { 42 }).await;

        assert_eq!(value, 42);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.stats().total_started, 1);
        assert!(gate.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_passes_through() {
        let gate = gate(Duration::from_secs(1), 10, 4, true);

        let result: Result<(), &str> = gate.admit(|| async { Err("boom") }).await;

        assert_eq!(result, Err("boom"));
        assert_eq!(gate.running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_cap_uses_rolling_window() {
        let gate = gate(Duration::from_secs(1), 2, 10, true);
        let t0 = Instant::now();

        let (starts, _) = run_workload(&gate, &[Duration::ZERO; 5]).await;
        let offsets: Vec<Duration> = starts.iter().map(|s| *s - t0).collect();

        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(2),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap() {
        let gate = gate(Duration::from_millis(10), 100, 3, true);

        let (_, peak) = run_workload(&gate, &[Duration::from_millis(50); 12]).await;

        assert_eq!(peak, 3);
        assert!(gate.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_is_fifo() {
        let gate = gate(Duration::from_millis(100), 1, 1, true);
        let order = Mutex::new(Vec::new());

        join_all((0..8).map(|i| {
            let order = &order;
            gate.admit(move || async move {
                order.lock().push(i);
            })
        }))
        .await;

        assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_carryover_reuses_freed_slots() {
        let gate = gate(Duration::from_secs(1), 10, 1, true);
        let t0 = Instant::now();

        let (starts, _) = run_workload(&gate, &[Duration::ZERO; 3]).await;

        assert!(starts.iter().all(|s| *s == t0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_carryover_slots_return_at_boundary() {
        let gate = gate(Duration::from_secs(1), 10, 1, false);
        let t0 = Instant::now();

        let (starts, _) = run_workload(&gate, &[Duration::ZERO; 3]).await;
        let offsets: Vec<Duration> = starts.iter().map(|s| *s - t0).collect();

        assert_eq!(
            offsets,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(gate.stats().deferred_slots, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_blocks_new_starts() {
        let gate = gate(Duration::from_secs(1), 10, 4, true);
        let t0 = Instant::now();

        gate.pause().arm(Duration::from_secs(3));
        assert!(gate.stats().paused);

        let started = gate.admit(|| async { Instant::now() }).await;
        assert!(started - t0 >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_interrupt_running_task() {
        let gate = gate(Duration::from_secs(1), 10, 4, true);
        let t0 = Instant::now();

        let finished = gate
            .admit(|| async {
                gate.pause().arm(Duration::from_secs(30));
                tokio::time::sleep(Duration::from_secs(1)).await;
                Instant::now()
            })
            .await;

        assert_eq!(finished - t0, Duration::from_secs(1));
        assert!(gate.pause().is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_task_releases_slot() {
        let gate = gate(Duration::from_secs(1), 10, 1, true);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            gate.admit(|| tokio::time::sleep(Duration::from_secs(60))),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(gate.running(), 0);

        let start = Instant::now();
        assert_eq!(gate.admit(|| async { 7 }).await, 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle() {
        let gate = Arc::new(gate(Duration::from_millis(10), 100, 2, true));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move {
                    gate.admit(|| tokio::time::sleep(Duration::from_millis(100)))
                        .await
                })
            })
            .collect();

        tokio::task::yield_now().await;
        gate.wait_idle().await;

        assert!(gate.is_idle());
        assert_eq!(gate.stats().total_started, 4);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_cap_scenario() {
        // 1000 starts per minute, 40 concurrent, 1050 instant tasks
        let gate = gate(Duration::from_secs(60), 1000, 40, true);

        let (mut starts, peak) = run_workload(&gate, &[Duration::ZERO; 1050]).await;
        starts.sort();

        assert!(peak <= 40);
        assert_eq!(starts[999], starts[0]);
        assert!(starts[1000] - starts[0] >= Duration::from_secs(60));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_limits_hold(
            interval_cap in 1u32..6,
            concurrency in 1u32..5,
            interval_ms in 10u64..500,
            carryover in any::<bool>(),
            work_ms in prop::collection::vec(0u64..300, 1..40),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let interval = Duration::from_millis(interval_ms);
            let work: Vec<Duration> = work_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();

            let (mut starts, peak) = runtime.block_on(async {
                let gate = gate(interval, interval_cap, concurrency, carryover);
                run_workload(&gate, &work).await
            });
            starts.sort();

            prop_assert!(peak <= concurrency);
            let cap = interval_cap as usize;
            for i in cap..starts.len() {
                prop_assert!(starts[i] - starts[i - cap] >= interval);
            }
        }
    }
}
