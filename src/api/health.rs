//! Shared health state for the /health endpoint.
//! Updated by the live monitor, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Monitor counters since process start.
#[derive(Default)]
pub struct HealthState {
    cycles: AtomicU64,
    polls: AtomicU64,
    fetch_failures: AtomicU64,
    completed_events: AtomicU64,
    /// Unix seconds of the last finished cycle (0 = none yet).
    last_cycle_at: AtomicI64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub cycles: u64,
    pub polls: u64,
    pub fetch_failures: u64,
    pub completed_events: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, at: DateTime<Utc>, polls: u64) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.polls.fetch_add(polls, Ordering::Relaxed);
        self.last_cycle_at.store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn inc_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completed(&self) {
        self.completed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_cycle_at.load(Ordering::Relaxed);
        HealthSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            completed_events: self.completed_events.load(Ordering::Relaxed),
            last_cycle_at: (last > 0).then(|| DateTime::from_timestamp(last, 0)).flatten(),
        }
    }
}
