use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;

use crate::types::EventId;

/// Per-event due times and consecutive-failure counters.
///
/// Owned by a single monitor; nothing here is persisted, so a restart starts
/// every live event from a fresh randomized first check.
pub struct SchedulerState {
    next_check_at: HashMap<EventId, DateTime<Utc>>,
    failures: HashMap<EventId, usize>,
    min_interval: Duration,
    max_interval: Duration,
    backoff_plan: Vec<Duration>,
    rng: StdRng,
}

impl SchedulerState {
    /// `backoff_plan` must be non-empty and `max_interval >= min_interval`;
    /// `MonitorConfig::normalized` guarantees both.
    pub fn new(
        min_interval: Duration,
        max_interval: Duration,
        backoff_plan: Vec<Duration>,
        rng: StdRng,
    ) -> Self {
        Self {
            next_check_at: HashMap::new(),
            failures: HashMap::new(),
            min_interval,
            max_interval: max_interval.max(min_interval),
            backoff_plan,
            rng,
        }
    }

    pub fn next_check_at(&self, event_id: EventId) -> Option<DateTime<Utc>> {
        self.next_check_at.get(&event_id).copied()
    }

    pub fn failure_count(&self, event_id: EventId) -> usize {
        self.failures.get(&event_id).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn tracked_count(&self) -> usize {
        self.next_check_at.len()
    }

    /// Events whose next check is at or before `now`, in id order.
    #[cfg(test)]
    pub fn due_events(&self, now: DateTime<Utc>) -> Vec<EventId> {
        let mut due: Vec<EventId> = self
            .next_check_at
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();
        due
    }

    #[cfg(test)]
    pub fn schedule_at(&mut self, event_id: EventId, at: DateTime<Utc>) {
        self.next_check_at.insert(event_id, at);
    }

    /// First sighting of a live event: never due immediately, so a batch of
    /// events going live together spreads out across the interval.
    pub fn assign_first_check(&mut self, event_id: EventId, now: DateTime<Utc>) -> DateTime<Utc> {
        self.reschedule(event_id, now)
    }

    /// Successful poll: clears the failure streak and picks a fresh interval.
    pub fn record_success(&mut self, event_id: EventId, now: DateTime<Utc>) -> DateTime<Utc> {
        self.failures.insert(event_id, 0);
        self.reschedule(event_id, now)
    }

    /// Failed fetch: waits `plan[min(k, len-1)]` where `k` is the number of
    /// failures before this one, then bumps the counter. Returns the delay.
    pub fn record_failure(&mut self, event_id: EventId, now: DateTime<Utc>) -> Duration {
        let count = self.failures.entry(event_id).or_insert(0);
        let idx = (*count).min(self.backoff_plan.len().saturating_sub(1));
        let delay = self.backoff_plan.get(idx).copied().unwrap_or(self.max_interval);
        *count += 1;
        self.next_check_at.insert(event_id, add_duration(now, delay));
        delay
    }

    /// Regular randomized next check without touching the failure counter.
    pub fn reschedule(&mut self, event_id: EventId, now: DateTime<Utc>) -> DateTime<Utc> {
        let at = add_duration(now, self.random_interval());
        self.next_check_at.insert(event_id, at);
        at
    }

    pub fn forget(&mut self, event_id: EventId) {
        self.next_check_at.remove(&event_id);
        self.failures.remove(&event_id);
    }

    /// Drops state for every event that left tracking scope.
    pub fn retain_active(&mut self, active: &HashSet<EventId>) -> usize {
        let before = self.next_check_at.len();
        self.next_check_at.retain(|id, _| active.contains(id));
        self.failures.retain(|id, _| active.contains(id));
        before - self.next_check_at.len()
    }

    /// Uniform in `[min_interval, max_interval]`, millisecond resolution.
    fn random_interval(&mut self) -> Duration {
        if self.max_interval <= self.min_interval {
            return self.min_interval;
        }
        let spread = (self.max_interval - self.min_interval).as_millis() as u64;
        self.min_interval + Duration::from_millis(self.rng.gen_range(0..=spread))
    }
}

/// `now + d`, saturating at the far future instead of overflowing.
pub fn add_duration(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
