//! Periodic polling with a per-handle random offset.
//!
//! Many rooms started by the same process would otherwise hit the remote
//! service in lockstep. Each handle samples one offset at start time and keeps
//! it for its whole lifetime, so the staleness of a single room stays
//! predictable while different rooms drift apart.

use crate::error::{BridgeError, Result};
use log::{debug, error, info, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Inclusive range of whole seconds added to the base interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min_secs: u64,
    max_secs: u64,
}

impl Jitter {
    /// Offset range used when nothing else is configured.
    pub const DEFAULT: Jitter = Jitter {
        min_secs: 1,
        max_secs: 20,
    };

    pub fn new(min_secs: u64, max_secs: u64) -> Result<Self> {
        if min_secs > max_secs {
            return Err(BridgeError::InvalidConfig(format!(
                "jitter minimum {}s exceeds maximum {}s",
                min_secs, max_secs
            )));
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn min_secs(&self) -> u64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    /// Draw one offset uniformly from the inclusive range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min_secs..=self.max_secs)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Running totals published by a schedule after every invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    /// Invocations that ran to completion, successful or not
    pub ticks: u64,
    /// Invocations that returned an error
    pub failures: u64,
    /// Message of the most recent failure, cleared by the next success
    pub last_error: Option<String>,
}

/// One running periodic task.
///
/// Dropping the handle cancels the schedule. Use [`ScheduleHandle::shutdown`]
/// to also wait until an invocation that is still in flight has finished.
pub struct ScheduleHandle {
    label: String,
    period: Duration,
    token: CancellationToken,
    stats: watch::Receiver<ScheduleStats>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Effective period: base interval plus the sampled offset.
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop starting new invocations. One already running is left to finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Snapshot of the current totals.
    pub fn stats(&self) -> ScheduleStats {
        self.stats.borrow().clone()
    }

    /// Receiver that observes every completed invocation.
    pub fn subscribe(&self) -> watch::Receiver<ScheduleStats> {
        self.stats.clone()
    }

    /// Cancel and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("[Scheduler] {} task ended abnormally: {}", self.label, e);
        }
        debug!("[Scheduler] {} stopped", self.label);
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts periodic tasks at `base + jitter`, firing once immediately.
#[derive(Debug, Clone, Copy)]
pub struct JitteredScheduler {
    base: Duration,
    jitter: Jitter,
}

impl JitteredScheduler {
    /// Fails with `InvalidConfig` when the shortest possible period is zero.
    pub fn new(base_interval_secs: u64, jitter: Jitter) -> Result<Self> {
        if base_interval_secs.saturating_add(jitter.min_secs) == 0 {
            return Err(BridgeError::InvalidConfig(
                "poll period can be zero: base interval and jitter minimum are both 0s"
                    .to_string(),
            ));
        }
        Ok(Self {
            base: Duration::from_secs(base_interval_secs),
            jitter,
        })
    }

    pub fn base_interval(&self) -> Duration {
        self.base
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Start `task` with an offset drawn from the thread-local generator.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut, T>(&self, label: impl Into<String>, task: F) -> ScheduleHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut rng = rand::thread_rng();
        self.start_with_rng(&mut rng, label, task)
    }

    /// Start `task` with an offset drawn from `rng`.
    pub fn start_with_rng<R, F, Fut, T>(
        &self,
        rng: &mut R,
        label: impl Into<String>,
        mut task: F,
    ) -> ScheduleHandle
    where
        R: Rng + ?Sized,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let label = label.into();
        let offset = self.jitter.sample(rng);
        let period = self.base + Duration::from_secs(offset);
        let token = CancellationToken::new();
        let (stats_tx, stats_rx) = watch::channel(ScheduleStats::default());

        info!(
            "[Scheduler] {} polling every {}s ({}s base + {}s jitter)",
            label,
            period.as_secs(),
            self.base.as_secs(),
            offset
        );

        let task_label = label.clone();
        let cancelled = token.clone();
        let join = tokio::spawn(async move {
            // First tick of a tokio interval completes immediately.
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }

                // Not raced against cancellation: a started invocation runs to the end.
                let outcome = task().await;

                stats_tx.send_modify(|stats| {
                    stats.ticks += 1;
                    match &outcome {
                        Ok(_) => stats.last_error = None,
                        Err(e) => {
                            stats.failures += 1;
                            stats.last_error = Some(e.to_string());
                        }
                    }
                });

                match outcome {
                    Err(e) if e.is_transient() => {
                        warn!("[Scheduler] {} poll failed: {}", task_label, e)
                    }
                    Err(e) => error!("[Scheduler] {} poll failed: {}", task_label, e),
                    Ok(_) => {}
                }
            }
        });

        ScheduleHandle {
            label,
            period,
            token,
            stats: stats_rx,
            task: Some(join),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::Instant;

    #[test]
    fn test_jitter_rejects_inverted_range() {
        assert!(Jitter::new(20, 1).is_err());
        assert!(Jitter::new(3, 3).is_ok());
    }

    #[test]
    fn test_jitter_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let jitter = Jitter::DEFAULT;
        for _ in 0..1000 {
            let offset = jitter.sample(&mut rng);
            assert!((1..=20).contains(&offset), "offset {} out of range", offset);
        }
    }

    #[test]
    fn test_scheduler_rejects_zero_period() {
        assert!(matches!(
            JitteredScheduler::new(0, Jitter::new(0, 0).unwrap()),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert!(matches!(
            JitteredScheduler::new(0, Jitter::new(0, 5).unwrap()),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert!(JitteredScheduler::new(0, Jitter::new(1, 5).unwrap()).is_ok());
        assert!(JitteredScheduler::new(1, Jitter::new(0, 0).unwrap()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_only_period_keeps_firing() {
        let scheduler = JitteredScheduler::new(0, Jitter::new(1, 1).unwrap()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handle = scheduler.start("fast", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BridgeError>(())
            }
        });
        assert_eq!(handle.period(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_in_range_and_varies_across_handles() {
        let scheduler = JitteredScheduler::new(600, Jitter::DEFAULT).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut periods = HashSet::new();
        for i in 0..32 {
            let handle = scheduler.start_with_rng(&mut rng, format!("room-{}", i), || async {
                Ok::<_, BridgeError>(())
            });
            let secs = handle.period().as_secs();
            assert!((601..=620).contains(&secs), "period {} out of range", secs);
            periods.insert(secs);
            handle.shutdown().await;
        }

        assert!(periods.len() > 1, "all handles sampled the same period");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_immediately_then_every_period() {
        let scheduler = JitteredScheduler::new(600, Jitter::new(5, 5).unwrap()).unwrap();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let recorder = fired.clone();
        let handle = scheduler.start("bedroom", move || {
            let recorder = recorder.clone();
            async move {
                recorder.lock().push(Instant::now());
                Ok::<_, BridgeError>(())
            }
        });
        assert_eq!(handle.period(), Duration::from_secs(605));

        let mut stats = handle.subscribe();
        stats.wait_for(|s| s.ticks >= 3).await.unwrap();

        let offsets: Vec<u64> = fired
            .lock()
            .iter()
            .map(|at| at.duration_since(start).as_secs())
            .collect();
        assert_eq!(&offsets[..3], &[0u64, 605, 1210]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_schedule() {
        let scheduler = JitteredScheduler::new(10, Jitter::new(1, 1).unwrap()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handle = scheduler.start("flaky", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n % 2 == 0 {
                    Err(BridgeError::RemoteUnavailable("connection reset".into()))
                } else {
                    Ok(())
                }
            }
        });

        let mut stats = handle.subscribe();
        stats.wait_for(|s| s.ticks >= 4).await.unwrap();

        let snapshot = handle.stats();
        assert_eq!(snapshot.ticks, 4);
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.last_error, None);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_ticks() {
        let scheduler = JitteredScheduler::new(30, Jitter::new(1, 1).unwrap()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handle = scheduler.start("office", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BridgeError>(()) }
        });

        let mut stats = handle.subscribe();
        stats.wait_for(|s| s.ticks >= 2).await.unwrap();

        handle.cancel();
        assert!(handle.is_cancelled());
        let before = calls.load(Ordering::SeqCst);

        tokio::time::sleep(handle.period() * 5).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_invocation_completes_after_cancel() {
        let scheduler = JitteredScheduler::new(30, Jitter::new(1, 1).unwrap()).unwrap();
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let (s, f, r) = (started.clone(), finished.clone(), release.clone());
        let handle = scheduler.start("nursery", move || {
            let (f, r) = (f.clone(), r.clone());
            s.fetch_add(1, Ordering::SeqCst);
            async move {
                r.notified().await;
                f.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BridgeError>(())
            }
        });

        while started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        handle.cancel();
        release.notify_one();
        handle.shutdown().await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let scheduler = JitteredScheduler::new(5, Jitter::new(1, 1).unwrap()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handle = scheduler.start("hall", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BridgeError>(()) }
        });
        let mut stats = handle.subscribe();
        stats.wait_for(|s| s.ticks >= 1).await.unwrap();
        drop(handle);

        let before = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }
}
