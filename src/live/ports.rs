use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BoutId, BoutOutcome, BoutSnapshot, EventId, EventStatus, TrackedEvent};

/// Enumerates the events the monitor is responsible for and moves their
/// status forward.
#[async_trait]
pub trait TrackedEventSource: Send + Sync {
    /// Non-completed events with a non-empty external reference.
    async fn list_trackable(&self) -> Result<Vec<TrackedEvent>>;

    /// Conditional write: implementations must never move status backwards.
    async fn set_status(&self, event_id: EventId, status: EventStatus) -> Result<()>;
}

#[async_trait]
pub trait BoutStore: Send + Sync {
    /// Stored bouts for the event, ordered by `sequence_no`.
    async fn list_bout_snapshots(&self, event_id: EventId) -> Result<Vec<BoutSnapshot>>;

    /// Overwrites the outcome fields of one bout. Errors when the bout does
    /// not belong to the event.
    async fn upsert_bout_outcome(
        &self,
        event_id: EventId,
        bout_id: BoutId,
        outcome: &BoutOutcome,
    ) -> Result<()>;
}

/// Read caches that must be dropped whenever an event changes.
#[async_trait]
pub trait EventCache: Send + Sync {
    async fn invalidate_event_detail(&self, event_id: EventId) -> Result<()>;

    async fn invalidate_events_list(&self) -> Result<()>;

    /// Drops both granularities. Callers should use this rather than the two
    /// halves so neither view is left stale.
    async fn invalidate(&self, event_id: EventId) -> Result<()> {
        let detail = self.invalidate_event_detail(event_id).await;
        let list = self.invalidate_events_list().await;
        detail.and(list)
    }
}
