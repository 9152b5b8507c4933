//! Daily sweep scheduler.

use crate::broadcast::{Notification, NotificationBroadcaster};
use crate::protocol::Mention;
use crate::SharedStore;
use chrono::{DateTime, NaiveTime, Utc};
use greeter_core::{Clock, CoreError, SweepReport, TransitionEngine};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Returns the first instant strictly after `now` whose UTC time of day is `at`.
pub fn next_fire(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Runs the transition engine once a day and on demand.
pub struct SweepScheduler {
    store: SharedStore,
    engine: TransitionEngine,
    clock: Arc<dyn Clock>,
    broadcaster: Arc<NotificationBroadcaster>,
    chat_id: i64,
    daily_at: NaiveTime,
    daily_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    sweeps_total: AtomicU64,
    shutdown: AtomicBool,
}

impl SweepScheduler {
    pub fn new(
        store: SharedStore,
        engine: TransitionEngine,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<NotificationBroadcaster>,
        chat_id: i64,
        daily_at: NaiveTime,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            broadcaster,
            chat_id,
            daily_at,
            daily_task: parking_lot::Mutex::new(None),
            sweeps_total: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Starts the daily sweep. Returns false if it is already running.
    pub fn start_tracking(self: &Arc<Self>) -> bool {
        let mut task = self.daily_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let scheduler = Arc::clone(self);
        *task = Some(tokio::spawn(async move { scheduler.run_daily().await }));
        tracing::info!("Tracking started, daily sweep at {} UTC", self.daily_at);
        true
    }

    /// Stops the daily sweep. Returns false if it was not running.
    pub fn stop_tracking(&self) -> bool {
        match self.daily_task.lock().take() {
            Some(task) => {
                task.abort();
                tracing::info!("Tracking stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.daily_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Spawns a single sweep after `delay`, independent of the daily schedule.
    pub fn run_once_after(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if scheduler.shutdown.load(Ordering::Relaxed) {
                return;
            }
            scheduler.sweep_and_log();
        })
    }

    async fn run_daily(self: Arc<Self>) {
        loop {
            let now = self.clock.now();
            let fire_at = next_fire(now, self.daily_at);
            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!("Next sweep at {}", fire_at);

            tokio::time::sleep(wait).await;

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.sweep_and_log();
        }
    }

    fn sweep_and_log(&self) {
        match self.run_sweep() {
            Ok(report) => tracing::info!(
                "Sweep complete: {} reminded, {} penalized",
                report.notified.len(),
                report.penalized.len()
            ),
            Err(e) => tracing::error!("Sweep failed to persist state: {}", e),
        }
    }

    /// Sweeps the store now and publishes a reminder for the members it notified.
    ///
    /// The reminder goes out even when persisting the sweep fails; the write error is
    /// returned afterwards.
    pub fn run_sweep(&self) -> Result<SweepReport, CoreError> {
        let now = self.clock.now();
        let (report, mentions, persisted) = {
            let mut store = self.store.lock();
            let report = self.engine.apply(&mut store, now);
            let mentions: Vec<Mention> = report
                .notified
                .iter()
                .filter_map(|id| {
                    store
                        .active()
                        .get(id)
                        .map(|record| Mention::from_record(*id, record))
                })
                .collect();
            (report, mentions, store.persist())
        };
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);

        if !mentions.is_empty() {
            self.broadcaster.publish(Notification {
                chat_id: self.chat_id,
                members: mentions,
            });
        }

        persisted?;
        Ok(report)
    }

    /// Stops the daily sweep and cancels pending one-shot sweeps.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.stop_tracking();
    }

    pub fn sweeps_total(&self) -> u64 {
        self.sweeps_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use greeter_core::{FixedClock, MemberId, MembershipStore, MemoryBackend, Thresholds};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn test_scheduler() -> (Arc<SweepScheduler>, SharedStore, Arc<FixedClock>) {
        let (scheduler, store, clock, _backend) = test_scheduler_with_backend();
        (scheduler, store, clock)
    }

    fn test_scheduler_with_backend(
    ) -> (Arc<SweepScheduler>, SharedStore, Arc<FixedClock>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store: SharedStore = Arc::new(parking_lot::Mutex::new(
            MembershipStore::load(backend.clone()).unwrap(),
        ));
        let clock = Arc::new(FixedClock::new(t0()));
        let engine = TransitionEngine::new(Thresholds::default()).unwrap();
        let scheduler = Arc::new(SweepScheduler::new(
            store.clone(),
            engine,
            clock.clone(),
            Arc::new(NotificationBroadcaster::default()),
            -100,
            noon(),
        ));
        (scheduler, store, clock, backend)
    }

    #[test]
    fn test_next_fire_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(
            next_fire(now, noon()),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        // Exactly at the fire time counts as already fired
        assert_eq!(
            next_fire(t0(), noon()),
            Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
        );

        let evening = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            next_fire(evening, noon()),
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_run_sweep_publishes_mentions() {
        let (scheduler, store, clock) = test_scheduler();
        let mut rx = scheduler.broadcaster.subscribe();

        store
            .lock()
            .record_join(MemberId::new(1), "Alice", Some("alice".into()), t0())
            .unwrap();
        store
            .lock()
            .record_join(MemberId::new(2), "Bob", None, t0() + chrono::Duration::days(1))
            .unwrap();

        clock.advance(chrono::Duration::hours(60));
        let report = scheduler.run_sweep().unwrap();
        assert_eq!(report.notified, vec![MemberId::new(1)]);

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.chat_id, -100);
        assert_eq!(
            notification.members,
            vec![Mention {
                id: MemberId::new(1),
                display_name: "Alice".to_string()
            }]
        );
        assert_eq!(scheduler.sweeps_total(), 1);
    }

    #[test]
    fn test_eviction_only_sweep_publishes_nothing() {
        let (scheduler, store, clock) = test_scheduler();
        let mut rx = scheduler.broadcaster.subscribe();
        store
            .lock()
            .record_join(MemberId::new(1), "Alice", None, t0())
            .unwrap();

        clock.advance(chrono::Duration::hours(60));
        scheduler.run_sweep().unwrap();
        rx.try_recv().unwrap();

        clock.advance(chrono::Duration::hours(24));
        let report = scheduler.run_sweep().unwrap();
        assert_eq!(report.penalized, vec![MemberId::new(1)]);
        assert!(rx.try_recv().is_err());
        assert!(store.lock().is_penalized(MemberId::new(1)));
    }

    #[test]
    fn test_reminder_published_when_persist_fails() {
        let (scheduler, store, clock, backend) = test_scheduler_with_backend();
        let mut rx = scheduler.broadcaster.subscribe();
        let id = MemberId::new(1);
        store.lock().record_join(id, "Alice", None, t0()).unwrap();

        backend.set_fail_saves(true);
        clock.advance(chrono::Duration::hours(60));
        let result = scheduler.run_sweep();
        assert!(matches!(result, Err(CoreError::Io(_))));

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.members[0].id, id);
        assert!(store.lock().active()[&id].notified);

        backend.set_fail_saves(false);
        clock.advance(chrono::Duration::hours(24));
        let report = scheduler.run_sweep().unwrap();
        assert_eq!(report.penalized, vec![id]);
        assert!(rx.try_recv().is_err());
        assert!(backend.saved().unwrap().penalized.contains_key(&id));
    }

    #[tokio::test]
    async fn test_start_and_stop_tracking() {
        let (scheduler, _store, _clock) = test_scheduler();

        assert!(!scheduler.is_tracking());
        assert!(scheduler.start_tracking());
        assert!(scheduler.is_tracking());
        assert!(!scheduler.start_tracking());

        assert!(scheduler.stop_tracking());
        assert!(!scheduler.is_tracking());
        assert!(!scheduler.stop_tracking());
    }

    #[tokio::test]
    async fn test_run_once_after() {
        let (scheduler, store, clock) = test_scheduler();
        let mut rx = scheduler.broadcaster.subscribe();
        store
            .lock()
            .record_join(MemberId::new(5), "Eve", None, t0())
            .unwrap();
        clock.advance(chrono::Duration::days(2));

        scheduler
            .run_once_after(Duration::from_millis(10))
            .await
            .unwrap();

        assert!(store.lock().active()[&MemberId::new(5)].notified);
        assert_eq!(rx.recv().await.unwrap().members.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_sweeps() {
        let (scheduler, store, clock) = test_scheduler();
        store
            .lock()
            .record_join(MemberId::new(5), "Eve", None, t0())
            .unwrap();
        clock.advance(chrono::Duration::days(2));
        assert!(scheduler.start_tracking());

        let pending = scheduler.run_once_after(Duration::from_millis(20));
        scheduler.shutdown();
        pending.await.unwrap();

        assert!(!scheduler.is_tracking());
        assert_eq!(scheduler.sweeps_total(), 0);
        assert!(!store.lock().active()[&MemberId::new(5)].notified);
    }
}
