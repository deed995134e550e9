use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{
    FETCH_TIMEOUT_SECS, MAX_POLL_INTERVAL_SECS, MAX_POLL_PER_TICK, MIN_POLL_INTERVAL_SECS,
    RETRY_BACKOFF_SECS, STALE_LIVE_WINDOW_HOURS, TICK_INTERVAL_SECS,
};
use crate::error::{AppError, Result};
use crate::fetcher::SnapshotFetcher;
use crate::live::clock::{Clock, SystemClock};
use crate::live::differ::diff_bouts;
use crate::live::ports::{BoutStore, EventCache, TrackedEventSource};
use crate::live::reconcile::{is_stale, reconcile_status};
use crate::live::schedule::SchedulerState;
use crate::types::{EventId, EventSnapshot, EventStatus, TrackedEvent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub tick_interval: Duration,
    pub min_poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub max_poll_per_tick: usize,
    pub backoff_plan: Vec<Duration>,
    pub stale_live_window: Duration,
    pub fetch_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            min_poll_interval: Duration::from_secs(MIN_POLL_INTERVAL_SECS),
            max_poll_interval: Duration::from_secs(MAX_POLL_INTERVAL_SECS),
            max_poll_per_tick: MAX_POLL_PER_TICK,
            backoff_plan: RETRY_BACKOFF_SECS.iter().copied().map(Duration::from_secs).collect(),
            stale_live_window: Duration::from_secs(STALE_LIVE_WINDOW_HOURS * 3600),
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }
}

impl MonitorConfig {
    /// Replaces zero/empty settings with defaults and clamps
    /// `max_poll_interval` up to `min_poll_interval`.
    pub fn normalized(mut self) -> Self {
        let defaults = MonitorConfig::default();
        if self.tick_interval.is_zero() {
            self.tick_interval = defaults.tick_interval;
        }
        if self.min_poll_interval.is_zero() {
            self.min_poll_interval = defaults.min_poll_interval;
        }
        if self.max_poll_interval.is_zero() {
            self.max_poll_interval = defaults.max_poll_interval;
        }
        if self.max_poll_interval < self.min_poll_interval {
            self.max_poll_interval = self.min_poll_interval;
        }
        if self.max_poll_per_tick == 0 {
            self.max_poll_per_tick = defaults.max_poll_per_tick;
        }
        if self.backoff_plan.is_empty() {
            self.backoff_plan = defaults.backoff_plan;
        }
        if self.stale_live_window.is_zero() {
            self.stale_live_window = defaults.stale_live_window;
        }
        if self.fetch_timeout.is_zero() {
            self.fetch_timeout = defaults.fetch_timeout;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What one poll cycle did. Logged after every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub tracked: usize,
    pub dropped: usize,
    pub promoted_live: usize,
    pub force_completed: usize,
    pub first_seen: usize,
    pub polled: usize,
    pub deferred: usize,
    pub fetch_failures: usize,
    pub store_failures: usize,
    pub completed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub completed: bool,
    pub bouts_updated: usize,
    pub changed: bool,
}

/// Why a poll did not finish. Fetch failures drive backoff; store failures
/// do not, since the feed itself was fine.
#[derive(Debug, Error)]
enum PollError {
    #[error("fetch failed: {0}")]
    Fetch(AppError),
    #[error("store write failed: {0}")]
    Store(AppError),
    #[error("cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// LiveMonitor
// ---------------------------------------------------------------------------

pub struct LiveMonitor {
    source: Arc<dyn TrackedEventSource>,
    bouts: Arc<dyn BoutStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    cache: Option<Arc<dyn EventCache>>,
    cfg: MonitorConfig,
    clock: Arc<dyn Clock>,
    schedule: SchedulerState,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl LiveMonitor {
    pub fn new(
        source: Arc<dyn TrackedEventSource>,
        bouts: Arc<dyn BoutStore>,
        fetcher: Arc<dyn SnapshotFetcher>,
        cache: Option<Arc<dyn EventCache>>,
        cfg: MonitorConfig,
    ) -> Self {
        let cfg = cfg.normalized();
        let schedule = SchedulerState::new(
            cfg.min_poll_interval,
            cfg.max_poll_interval,
            cfg.backoff_plan.clone(),
            StdRng::from_entropy(),
        );
        Self {
            source,
            bouts,
            fetcher,
            cache,
            cfg,
            clock: Arc::new(SystemClock),
            schedule,
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the jitter source. Discards any scheduler state.
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.schedule = SchedulerState::new(
            self.cfg.min_poll_interval,
            self.cfg.max_poll_interval,
            self.cfg.backoff_plan.clone(),
            rng,
        );
        self
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = health;
        self
    }

    pub fn with_latency(mut self, latency: Arc<LatencyStats>) -> Self {
        self.latency = latency;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    #[cfg(test)]
    pub fn schedule(&self) -> &SchedulerState {
        &self.schedule
    }

    #[cfg(test)]
    pub fn schedule_mut(&mut self) -> &mut SchedulerState {
        &mut self.schedule
    }

    /// Runs one cycle immediately, then one per tick until `shutdown` fires.
    /// A failed cycle is logged and retried on the next tick.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = interval(self.cfg.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_secs = self.cfg.tick_interval.as_secs(),
            max_poll_per_tick = self.cfg.max_poll_per_tick,
            "Live monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_once(&shutdown).await {
                        Ok(report) => log_cycle(&report),
                        Err(e) => error!("Live monitor cycle failed: {e}"),
                    }
                }
            }
        }
        info!("Live monitor stopped");
    }

    /// One poll cycle over every trackable event. Only a failure to list the
    /// events is returned; per-event failures are absorbed into the report.
    pub async fn run_once(&mut self, shutdown: &CancellationToken) -> Result<CycleReport> {
        let events = self.source.list_trackable().await?;
        let now = self.clock.now();
        let mut report = CycleReport { tracked: events.len(), ..Default::default() };

        let active: HashSet<EventId> = events.iter().map(|e| e.id).collect();
        report.dropped = self.schedule.retain_active(&active);

        let mut polls = 0usize;
        for event in &events {
            if shutdown.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !event.is_trackable() {
                continue;
            }

            let mut status = event.status;
            if status == EventStatus::Scheduled && event.has_started(now) {
                match self.source.set_status(event.id, EventStatus::Live).await {
                    Ok(()) => {
                        info!(event_id = event.id, "Event started, marked live");
                        status = status.advance(EventStatus::Live);
                        report.promoted_live += 1;
                        self.invalidate(event.id).await;
                    }
                    Err(e) => warn!(event_id = event.id, "Failed to mark event live: {e}"),
                }
            }
            if status != EventStatus::Live {
                continue;
            }

            if is_stale(event.starts_at, now, self.cfg.stale_live_window) {
                self.force_complete(event, &mut report).await;
                continue;
            }

            let Some(due_at) = self.schedule.next_check_at(event.id) else {
                let at = self.schedule.assign_first_check(event.id, now);
                debug!(event_id = event.id, next_check_at = %at, "First sighting, scheduled");
                report.first_seen += 1;
                continue;
            };
            if now < due_at {
                continue;
            }
            if polls >= self.cfg.max_poll_per_tick {
                report.deferred += 1;
                continue;
            }
            polls += 1;
            report.polled += 1;

            match self.poll_event(event, now, shutdown).await {
                Ok(outcome) if outcome.completed => {
                    info!(
                        event_id = event.id,
                        bouts_updated = outcome.bouts_updated,
                        "Event completed, no longer tracked"
                    );
                    self.schedule.forget(event.id);
                    report.completed += 1;
                    self.health.inc_completed();
                }
                Ok(outcome) => {
                    let next = self.schedule.record_success(event.id, now);
                    debug!(
                        event_id = event.id,
                        bouts_updated = outcome.bouts_updated,
                        next_check_at = %next,
                        "Polled live event"
                    );
                }
                Err(PollError::Fetch(e)) => {
                    let delay = self.schedule.record_failure(event.id, now);
                    warn!(
                        event_id = event.id,
                        failures = self.schedule.failure_count(event.id),
                        delay_secs = delay.as_secs(),
                        "Snapshot fetch failed, backing off: {e}"
                    );
                    report.fetch_failures += 1;
                    self.health.inc_fetch_failures();
                }
                Err(PollError::Store(e)) => {
                    let next = self.schedule.reschedule(event.id, now);
                    error!(event_id = event.id, next_check_at = %next, "Store write failed: {e}");
                    report.store_failures += 1;
                }
                Err(PollError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        self.health.record_cycle(now, report.polled as u64);
        Ok(report)
    }

    /// Fetches the event's snapshot and merges it into the store.
    async fn poll_event(
        &self,
        event: &TrackedEvent,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> std::result::Result<PollOutcome, PollError> {
        let snapshot = self.fetch(event, shutdown).await?;

        let mut stored = self
            .bouts
            .list_bout_snapshots(event.id)
            .await
            .map_err(PollError::Store)?;
        stored.sort_by_key(|b| b.sequence_no);

        let mut outcome = PollOutcome::default();
        for change in diff_bouts(&snapshot.bouts, &stored) {
            if let Err(e) = self
                .bouts
                .upsert_bout_outcome(event.id, change.bout_id, &change.outcome)
                .await
            {
                if outcome.changed {
                    self.invalidate(event.id).await;
                }
                return Err(PollError::Store(e));
            }
            outcome.bouts_updated += 1;
            outcome.changed = true;
        }

        let status = reconcile_status(
            &snapshot.status,
            event.starts_at,
            now,
            &snapshot.bouts,
            self.cfg.stale_live_window,
        );
        if status == EventStatus::Completed {
            if let Err(e) = self.source.set_status(event.id, EventStatus::Completed).await {
                if outcome.changed {
                    self.invalidate(event.id).await;
                }
                return Err(PollError::Store(e));
            }
            outcome.completed = true;
            outcome.changed = true;
        }

        if outcome.changed {
            self.invalidate(event.id).await;
        }
        Ok(outcome)
    }

    async fn fetch(
        &self,
        event: &TrackedEvent,
        shutdown: &CancellationToken,
    ) -> std::result::Result<EventSnapshot, PollError> {
        let started = Instant::now();
        let request = tokio::time::timeout(
            self.cfg.fetch_timeout,
            self.fetcher.fetch_snapshot(&event.external_ref),
        );
        let result = tokio::select! {
            _ = shutdown.cancelled() => return Err(PollError::Cancelled),
            result = request => result,
        };
        self.latency.record(started.elapsed());
        match result {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(e)) => Err(PollError::Fetch(e)),
            Err(_) => Err(PollError::Fetch(AppError::Timeout(format!(
                "snapshot fetch for event {} after {}s",
                event.id,
                self.cfg.fetch_timeout.as_secs()
            )))),
        }
    }

    /// Stale live event: completes it without touching the feed.
    async fn force_complete(&mut self, event: &TrackedEvent, report: &mut CycleReport) {
        match self.source.set_status(event.id, EventStatus::Completed).await {
            Ok(()) => {
                info!(event_id = event.id, "Live event past stale window, force-completed");
                self.schedule.forget(event.id);
                report.force_completed += 1;
                self.health.inc_completed();
                self.invalidate(event.id).await;
            }
            Err(e) => warn!(event_id = event.id, "Failed to force-complete stale event: {e}"),
        }
    }

    async fn invalidate(&self, event_id: EventId) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.invalidate(event_id).await {
            warn!(event_id, "Cache invalidation failed: {e}");
        }
    }
}

fn log_cycle(r: &CycleReport) {
    info!(
        tracked = r.tracked,
        polled = r.polled,
        deferred = r.deferred,
        completed = r.completed + r.force_completed,
        fetch_failures = r.fetch_failures,
        store_failures = r.store_failures,
        "Live cycle: {} tracked, {} polled, {} deferred, +{} live, {} completed",
        r.tracked,
        r.polled,
        r.deferred,
        r.promoted_live,
        r.completed + r.force_completed,
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
