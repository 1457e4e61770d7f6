//! Eviction scheduler - unloads worlds that have been empty for too long.
//!
//! Each sweep works on a snapshot of the idle tracker. An entry is claimed
//! with compare-and-remove before its world is unloaded, so an occupant who
//! arrives mid-sweep keeps the world loaded. One world failing to unload never
//! stops the sweep; its entry goes back into the tracker for the next sweep.

use std::sync::Arc;
use std::time::Duration;

use buildsys_domain::WorldName;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{ClockPort, StorageError, WorldStorageEngine};
use crate::stores::{IdleEntry, IdleWorldTracker, WorldRegistry};

/// Sweep timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionConfig {
    /// Time between sweeps
    pub sweep_interval: Duration,
    /// Minimum time a world must have been empty before it is unloaded
    pub idle_threshold: Duration,
    /// Upper bound on a single unload call
    pub unload_timeout: Duration,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(300),
            unload_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a single world could not be evicted. Never escapes a sweep.
#[derive(Debug, thiserror::Error)]
pub enum EvictionItemError {
    #[error("Unload failed: {0}")]
    Unload(#[from] StorageError),

    #[error("Unload timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub evicted: Vec<WorldName>,
    pub failed: Vec<(WorldName, EvictionItemError)>,
    /// Due entries left untouched because shutdown was requested.
    pub skipped_cancelled: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.failed.is_empty() && self.skipped_cancelled == 0
    }
}

pub struct EvictionScheduler {
    tracker: Arc<IdleWorldTracker>,
    registry: Arc<WorldRegistry>,
    storage: Arc<dyn WorldStorageEngine>,
    clock: Arc<dyn ClockPort>,
    config: EvictionConfig,
}

impl EvictionScheduler {
    pub fn new(
        tracker: Arc<IdleWorldTracker>,
        registry: Arc<WorldRegistry>,
        storage: Arc<dyn WorldStorageEngine>,
        clock: Arc<dyn ClockPort>,
        config: EvictionConfig,
    ) -> Self {
        Self {
            tracker,
            registry,
            storage,
            clock,
            config,
        }
    }

    /// Unload every world idle for at least the threshold.
    ///
    /// Cancellation is checked between items; the item in flight finishes.
    pub async fn sweep(&self, cancel: &CancellationToken) -> SweepReport {
        let now = self.clock.now();
        let due: Vec<IdleEntry> = self
            .tracker
            .snapshot()
            .into_iter()
            .filter(|entry| {
                // A `since` in the future counts as not idle yet.
                let idle_for = (now - entry.since).to_std().unwrap_or(Duration::ZERO);
                idle_for >= self.config.idle_threshold
            })
            .collect();

        let mut report = SweepReport::default();
        for (index, entry) in due.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped_cancelled = due.len() - index;
                tracing::info!(
                    skipped = report.skipped_cancelled,
                    "Sweep cut off by shutdown"
                );
                break;
            }

            if !self.tracker.claim(entry) {
                tracing::debug!(world = %entry.world, "Occupancy changed since snapshot, skipping");
                continue;
            }

            match self.unload(&entry.world).await {
                Ok(()) => {
                    self.tracker.complete(entry);
                    if self.registry.set_loaded(&entry.world, false).await.is_err() {
                        tracing::debug!(
                            world = %entry.world,
                            "Evicted world is not in the registry"
                        );
                    }
                    tracing::info!(
                        world = %entry.world,
                        idle_since = %entry.since,
                        "Evicted idle world"
                    );
                    report.evicted.push(entry.world.clone());
                }
                Err(e) => {
                    let restored = self.tracker.restore(entry);
                    tracing::warn!(
                        world = %entry.world,
                        error = %e,
                        retry_next_sweep = restored,
                        "Failed to evict idle world"
                    );
                    report.failed.push((entry.world.clone(), e));
                }
            }
        }
        report
    }

    async fn unload(&self, world: &WorldName) -> Result<(), EvictionItemError> {
        match tokio::time::timeout(self.config.unload_timeout, self.storage.unload(world)).await {
            Ok(result) => result.map_err(EvictionItemError::from),
            Err(_) => Err(EvictionItemError::Timeout(self.config.unload_timeout)),
        }
    }

    /// Sweep on a fixed interval until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval = ?self.config.sweep_interval,
            threshold = ?self.config.idle_threshold,
            "Eviction scheduler started"
        );
        let start = tokio::time::Instant::now() + self.config.sweep_interval;
        let mut ticker = tokio::time::interval_at(start, self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Eviction scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.sweep(&cancel).await;
                    if !report.is_empty() {
                        tracing::info!(
                            evicted = report.evicted.len(),
                            failed = report.failed.len(),
                            skipped = report.skipped_cancelled,
                            "Idle world sweep finished"
                        );
                    }
                }
            }
        }
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(scheduler.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::ports::MockWorldStorageEngine;
    use crate::stores::UpsertMode;
    use async_trait::async_trait;
    use buildsys_domain::{PrincipalId, WorldKind, WorldRecord};
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::*;

    fn w(name: &str) -> WorldName {
        WorldName::new(name).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    async fn loaded_registry(names: &[&str]) -> Arc<WorldRegistry> {
        let registry = Arc::new(WorldRegistry::new());
        for n in names {
            let owner = PrincipalId::new("bob").unwrap();
            let record = WorldRecord::new(w(n), owner, WorldKind::Flat, t0()).with_loaded(true);
            registry.upsert(record, UpsertMode::CreateOnly).await.unwrap();
        }
        registry
    }

    struct Fixture {
        tracker: Arc<IdleWorldTracker>,
        registry: Arc<WorldRegistry>,
        clock: Arc<ManualClock>,
        scheduler: EvictionScheduler,
    }

    async fn fixture(storage: impl WorldStorageEngine + 'static, worlds: &[&str]) -> Fixture {
        let tracker = Arc::new(IdleWorldTracker::new());
        let registry = loaded_registry(worlds).await;
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = EvictionScheduler::new(
            Arc::clone(&tracker),
            Arc::clone(&registry),
            Arc::new(storage),
            clock.clone(),
            EvictionConfig {
                sweep_interval: Duration::from_secs(60),
                idle_threshold: Duration::from_secs(300),
                unload_timeout: Duration::from_millis(100),
            },
        );
        Fixture {
            tracker,
            registry,
            clock,
            scheduler,
        }
    }

    #[tokio::test]
    async fn evicts_only_after_threshold() {
        let mut storage = MockWorldStorageEngine::new();
        storage
            .expect_unload()
            .with(eq(w("w1")))
            .times(1)
            .returning(|_| Ok(()));
        let f = fixture(storage, &["w1"]).await;
        f.tracker.mark_empty(&w("w1"), t0());
        let cancel = CancellationToken::new();

        f.clock.set(t0() + secs(299));
        let report = f.scheduler.sweep(&cancel).await;
        assert!(report.evicted.is_empty());
        assert!(f.tracker.is_idle(&w("w1")));

        f.clock.set(t0() + secs(301));
        let report = f.scheduler.sweep(&cancel).await;
        assert_eq!(report.evicted, vec![w("w1")]);
        assert!(!f.tracker.is_idle(&w("w1")));
        assert!(!f.registry.find(&w("w1")).await.unwrap().is_loaded());
    }

    #[tokio::test]
    async fn exactly_threshold_is_due() {
        let mut storage = MockWorldStorageEngine::new();
        storage.expect_unload().times(1).returning(|_| Ok(()));
        let f = fixture(storage, &["w1"]).await;
        f.tracker.mark_empty(&w("w1"), t0());
        f.clock.set(t0() + secs(300));

        let report = f.scheduler.sweep(&CancellationToken::new()).await;

        assert_eq!(report.evicted, vec![w("w1")]);
    }

    #[tokio::test]
    async fn occupied_worlds_are_never_unloaded() {
        let mut storage = MockWorldStorageEngine::new();
        storage.expect_unload().never();
        let f = fixture(storage, &["w1"]).await;
        f.tracker.mark_empty(&w("w1"), t0());
        f.tracker.mark_occupied(&w("w1"), t0() + secs(10));
        f.clock.advance(secs(3600));

        let report = f.scheduler.sweep(&CancellationToken::new()).await;

        assert!(report.is_empty());
        assert!(f.registry.find(&w("w1")).await.unwrap().is_loaded());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_sweep() {
        let mut storage = MockWorldStorageEngine::new();
        storage
            .expect_unload()
            .with(eq(w("broken")))
            .returning(|_| Err(StorageError::io("unload", "locked by host")));
        storage
            .expect_unload()
            .with(eq(w("fine")))
            .times(1)
            .returning(|_| Ok(()));
        let f = fixture(storage, &["broken", "fine"]).await;
        f.tracker.mark_empty(&w("broken"), t0());
        f.tracker.mark_empty(&w("fine"), t0());
        f.clock.set(t0() + secs(600));

        let report = f.scheduler.sweep(&CancellationToken::new()).await;

        assert_eq!(report.evicted, vec![w("fine")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, w("broken"));
        assert!(matches!(report.failed[0].1, EvictionItemError::Unload(_)));
        // Failed entry stays tracked for the next sweep.
        assert_eq!(f.tracker.idle_since(&w("broken")), Some(t0()));
        assert!(f.registry.find(&w("broken")).await.unwrap().is_loaded());
    }

    #[tokio::test]
    async fn cancelled_sweep_touches_nothing() {
        let mut storage = MockWorldStorageEngine::new();
        storage.expect_unload().never();
        let f = fixture(storage, &["a", "b"]).await;
        f.tracker.mark_empty(&w("a"), t0());
        f.tracker.mark_empty(&w("b"), t0());
        f.clock.set(t0() + secs(600));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = f.scheduler.sweep(&cancel).await;

        assert_eq!(report.skipped_cancelled, 2);
        assert_eq!(f.tracker.len(), 2);
    }

    #[tokio::test]
    async fn unloads_world_missing_from_registry() {
        let mut storage = MockWorldStorageEngine::new();
        storage.expect_unload().times(1).returning(|_| Ok(()));
        let f = fixture(storage, &[]).await;
        f.tracker.mark_empty(&w("stray"), t0());
        f.clock.set(t0() + secs(600));

        let report = f.scheduler.sweep(&CancellationToken::new()).await;

        assert_eq!(report.evicted, vec![w("stray")]);
    }

    /// Storage engine whose unload hangs well past the sweep's per-item timeout.
    struct SlowUnload;

    #[async_trait]
    impl WorldStorageEngine for SlowUnload {
        async fn list_world_names(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
        async fn list_loaded_worlds(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
        async fn create(&self, _: &WorldName, _: WorldKind) -> Result<(), StorageError> {
            Ok(())
        }
        async fn load(&self, _: &WorldName) -> Result<(), StorageError> {
            Ok(())
        }
        async fn unload(&self, world: &WorldName) -> Result<(), StorageError> {
            if world.as_str() == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(())
        }
        async fn delete(&self, _: &WorldName) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_unload_times_out_without_stalling_others() {
        let f = fixture(SlowUnload, &["slow", "quick"]).await;
        f.tracker.mark_empty(&w("slow"), t0());
        f.tracker.mark_empty(&w("quick"), t0());
        f.clock.set(t0() + secs(600));

        let started = std::time::Instant::now();
        let report = f.scheduler.sweep(&CancellationToken::new()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.evicted, vec![w("quick")]);
        assert!(matches!(report.failed[0].1, EvictionItemError::Timeout(_)));
        assert!(f.tracker.is_idle(&w("slow")));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let f = fixture(MockWorldStorageEngine::new(), &[]).await;
        let scheduler = Arc::new(f.scheduler);
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
