use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{diff_snapshots, ChangeSet};
use crate::broadcast::{Broadcaster, Subscription};
use crate::cache::{ReadOptions, TieredCache};
use crate::config::PollConfig;
use crate::models::Table;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// First snapshot; stored without emitting anything.
    Baseline { tables: usize },
    Unchanged,
    Changed(ChangeSet),
    /// Only stale data was available; the baseline was left alone.
    Stale,
    Failed(String),
    /// Stopped while the fetch was in flight.
    Cancelled,
}

struct Inner {
    cache: Arc<TieredCache>,
    broadcaster: Broadcaster<ChangeSet>,
    options: ReadOptions,
    baseline: RwLock<Option<Vec<Table>>>,
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Polls the cache on an interval and publishes a `ChangeSet` when the
/// table set moves.
pub struct ChangeDetector {
    inner: Arc<Inner>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl ChangeDetector {
    pub fn new(
        cache: Arc<TieredCache>,
        broadcaster: Broadcaster<ChangeSet>,
        config: &PollConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                broadcaster,
                options: ReadOptions {
                    force_refresh: config.force_refresh,
                    room: None,
                },
                baseline: RwLock::new(None),
            }),
            period: config.interval(),
            running: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn subscribe(&self) -> Subscription<ChangeSet> {
        self.inner.broadcaster.subscribe()
    }

    /// Spawn the polling task. Calling this while already running does
    /// nothing.
    pub fn start(&self) {
        let Ok(mut running) = self.running.lock() else {
            warn!("Change detector state poisoned, not starting");
            return;
        };
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Change detector already running");
            return;
        }

        let token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let period = self.period;
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Change detector stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        inner.tick(&task_token).await;
                    }
                }
            }
        });

        info!(interval_secs = period.as_secs(), "Change detector started");
        *running = Some(Running { token, handle });
    }

    /// Cancel the polling task. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let stopped = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };
        if let Some(running) = stopped {
            running.token.cancel();
            info!("Change detector stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.as_ref().is_some_and(|r| !r.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Run one tick inline.
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.tick(&CancellationToken::new()).await
    }

    pub async fn baseline(&self) -> Option<Vec<Table>> {
        self.inner.baseline.read().await.clone()
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn tick(&self, token: &CancellationToken) -> PollOutcome {
        let entry = match self.cache.get(None, &self.options).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Change detection fetch failed, skipping tick");
                return PollOutcome::Failed(e.to_string());
            }
        };

        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        if entry.stale {
            debug!("Only stale data available, keeping baseline");
            return PollOutcome::Stale;
        }

        let mut baseline = self.baseline.write().await;
        // stop() may have landed while waiting for the lock.
        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        let outcome = match baseline.as_deref() {
            None => {
                info!(tables = entry.data.len(), "Captured change detection baseline");
                PollOutcome::Baseline {
                    tables: entry.data.len(),
                }
            }
            Some(previous) => {
                let changes = diff_snapshots(previous, &entry.data, self.cache.now());
                if changes.has_changes {
                    info!(changes = %changes.summary(), "Detected table changes");
                    let delivered = self.broadcaster.publish(changes.clone());
                    debug!(delivered, "Published change set");
                    PollOutcome::Changed(changes)
                } else {
                    PollOutcome::Unchanged
                }
            }
        };
        *baseline = Some(entry.data);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::CacheConfig;
    use crate::models::Player;
    use crate::testing::{sample_table, FakeSource};

    struct Harness {
        detector: ChangeDetector,
        source: Arc<FakeSource>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::new(vec![sample_table()]));
        let cache = TieredCache::new(
            source.clone(),
            &CacheConfig::default(),
            dir.path().to_path_buf(),
            "Sheet1!A:H",
        )
        .expect("cache")
        .with_clock(Arc::new(ManualClock::default()));
        let config = PollConfig {
            force_refresh: true,
            ..PollConfig::default()
        };
        let detector = ChangeDetector::new(Arc::new(cache), Broadcaster::new(8), &config);
        Harness {
            detector,
            source,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_first_tick_sets_baseline_silently() {
        let h = harness();
        let mut sub = h.detector.subscribe();

        assert_eq!(h.detector.poll_once().await, PollOutcome::Baseline { tables: 1 });
        assert_eq!(h.detector.poll_once().await, PollOutcome::Unchanged);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_chip_change_is_published() {
        let h = harness();
        let mut sub = h.detector.subscribe();
        h.detector.poll_once().await;

        let mut updated = sample_table();
        updated.players[0].chips = 2500.0;
        h.source.set_tables(vec![updated.clone()]);

        let outcome = h.detector.poll_once().await;
        assert!(matches!(outcome, PollOutcome::Changed(ref c) if c.chip_changes.len() == 1));

        let published = sub.recv().await.expect("change set");
        assert_eq!(published.chip_changes[0].delta, 500.0);
        assert_eq!(h.detector.baseline().await, Some(vec![updated]));
    }

    #[tokio::test]
    async fn test_stale_and_failed_ticks_keep_baseline() {
        let h = harness();
        h.detector.poll_once().await;

        h.source.set_tables(vec![sample_table().with_player(Player::new(3, "Carol", "FRA", 10.0))]);
        h.source.set_failing(true);

        // A disk snapshot exists, so the failed fetch degrades to stale data.
        assert_eq!(h.detector.poll_once().await, PollOutcome::Stale);
        assert_eq!(h.detector.baseline().await, Some(vec![sample_table()]));

        h.source.set_failing(false);
        let outcome = h.detector.poll_once().await;
        assert!(matches!(outcome, PollOutcome::Changed(ref c) if c.added_players.len() == 1));
    }

    #[tokio::test]
    async fn test_failed_tick_without_data() {
        let h = harness();
        h.source.set_failing(true);

        assert!(matches!(h.detector.poll_once().await, PollOutcome::Failed(_)));
        assert!(h.detector.baseline().await.is_none());
    }

    #[tokio::test]
    async fn test_tick_cancelled_mid_fetch_is_discarded() {
        let h = harness();
        let mut sub = h.detector.subscribe();
        h.detector.poll_once().await;

        let mut updated = sample_table();
        updated.players[0].chips = 9000.0;
        h.source.set_tables(vec![updated]);
        h.source.set_delay(Duration::from_millis(200));

        let token = CancellationToken::new();
        let inner = Arc::clone(&h.detector.inner);
        let tick_token = token.clone();
        let tick = tokio::spawn(async move { inner.tick(&tick_token).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        assert_eq!(tick.await.expect("tick task"), PollOutcome::Cancelled);
        assert_eq!(h.detector.baseline().await, Some(vec![sample_table()]));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_stop_during_running_tick_publishes_nothing() {
        let h = harness();
        let mut sub = h.detector.subscribe();
        h.detector.poll_once().await;

        let mut updated = sample_table();
        updated.players[1].chips = 100.0;
        h.source.set_tables(vec![updated]);
        h.source.set_delay(Duration::from_millis(200));

        let detector = h.detector.with_interval(Duration::from_secs(3600));
        detector.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        detector.stop();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(h.source.fetches(), 2);
        assert_eq!(detector.baseline().await, Some(vec![sample_table()]));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness();
        let detector = h.detector.with_interval(Duration::from_millis(20));

        detector.stop();
        detector.start();
        detector.start();
        assert!(detector.is_running());

        let mut waited = 0;
        while detector.baseline().await.is_none() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert!(detector.baseline().await.is_some());

        detector.stop();
        detector.stop();
        assert!(!detector.is_running());
    }
}
