use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::TRACKED_ORG;
use crate::db::models::{null_if_empty, null_if_zero, BoutRow, EventRow};
use crate::error::{AppError, Result};
use crate::live::ports::{BoutStore, TrackedEventSource};
use crate::types::{
    BoutId, BoutOutcome, BoutSnapshot, EventCard, EventId, EventStatus, EventSummary, TrackedEvent,
};

/// Status rank computed in SQL so a write can only move forward even when
/// two writers race.
const STATUS_RANK_SQL: &str =
    "CASE status WHEN 'scheduled' THEN 0 WHEN 'live' THEN 1 WHEN 'completed' THEN 2 ELSE -1 END";

/// Event and bout persistence over SQLite.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- read API ----

    /// All events, most recent start first.
    pub async fn list_events(&self) -> Result<Vec<EventSummary>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, starts_at, venue, external_url
            FROM events
            ORDER BY starts_at IS NULL OR starts_at <= 0, starts_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_summary).collect()
    }

    pub async fn event_card(&self, event_id: EventId) -> Result<EventCard> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, name, status, starts_at, venue, external_url FROM events WHERE id = ?",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        let event = row.ok_or(AppError::EventNotFound(event_id))?.into_summary()?;
        let bouts = self.list_bout_snapshots(event_id).await?;
        Ok(EventCard { event, bouts })
    }

    async fn event_exists(&self, event_id: EventId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE id = ?")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl TrackedEventSource for SqliteEventStore {
    async fn list_trackable(&self) -> Result<Vec<TrackedEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, starts_at, venue, external_url
            FROM events
            WHERE org = ?
              AND status IN ('scheduled', 'live')
              AND TRIM(COALESCE(external_url, '')) <> ''
            ORDER BY starts_at IS NULL OR starts_at <= 0, starts_at ASC, id ASC
            "#,
        )
        .bind(TRACKED_ORG)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_tracked).collect()
    }

    async fn set_status(&self, event_id: EventId, status: EventStatus) -> Result<()> {
        let sql = format!("UPDATE events SET status = ? WHERE id = ? AND {STATUS_RANK_SQL} < ?");
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(event_id)
            .bind(status.rank())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            if !self.event_exists(event_id).await? {
                return Err(AppError::EventNotFound(event_id));
            }
            debug!(event_id, status = %status, "Status write skipped, already at or past target");
        }
        Ok(())
    }
}

#[async_trait]
impl BoutStore for SqliteEventStore {
    async fn list_bout_snapshots(&self, event_id: EventId) -> Result<Vec<BoutSnapshot>> {
        let rows: Vec<BoutRow> = sqlx::query_as(
            r#"
            SELECT id, sequence_no, red_fighter_id, blue_fighter_id,
                   winner_fighter_id, method, round, time_sec, result
            FROM bouts
            WHERE event_id = ?
            ORDER BY sequence_no ASC, id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BoutSnapshot::from).collect())
    }

    async fn upsert_bout_outcome(
        &self,
        event_id: EventId,
        bout_id: BoutId,
        outcome: &BoutOutcome,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE bouts
            SET winner_fighter_id = ?, method = ?, round = ?, time_sec = ?, result = ?
            WHERE id = ? AND event_id = ?
            "#,
        )
        .bind(outcome.winner_id.and_then(null_if_zero))
        .bind(null_if_empty(&outcome.method))
        .bind(null_if_zero(i64::from(outcome.round)))
        .bind(null_if_zero(i64::from(outcome.time_sec)))
        .bind(null_if_empty(&outcome.result_text))
        .bind(bout_id)
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BoutNotFound { event_id, bout_id });
        }
        Ok(())
    }
}
