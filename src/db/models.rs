//! Row shapes as stored in SQLite, and their conversion into domain types.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::types::{BoutSnapshot, EventStatus, EventSummary, TrackedEvent};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub starts_at: Option<i64>,
    pub venue: String,
    pub external_url: Option<String>,
}

impl EventRow {
    fn status(&self) -> Result<EventStatus> {
        EventStatus::parse(&self.status).ok_or_else(|| {
            AppError::InvalidStatus(format!("event {} has status {:?}", self.id, self.status))
        })
    }

    pub fn into_tracked(self) -> Result<TrackedEvent> {
        Ok(TrackedEvent {
            id: self.id,
            status: self.status()?,
            starts_at: self.starts_at.and_then(from_unix),
            external_ref: self.external_url.unwrap_or_default(),
        })
    }

    pub fn into_summary(self) -> Result<EventSummary> {
        Ok(EventSummary {
            id: self.id,
            status: self.status()?,
            starts_at: self.starts_at.and_then(from_unix),
            name: self.name,
            venue: self.venue,
        })
    }
}

/// Outcome columns are NULL until the bout is decided.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BoutRow {
    pub id: i64,
    pub sequence_no: i64,
    pub red_fighter_id: i64,
    pub blue_fighter_id: i64,
    pub winner_fighter_id: Option<i64>,
    pub method: Option<String>,
    pub round: Option<i64>,
    pub time_sec: Option<i64>,
    pub result: Option<String>,
}

impl From<BoutRow> for BoutSnapshot {
    fn from(r: BoutRow) -> Self {
        BoutSnapshot {
            bout_id: r.id,
            sequence_no: clamp_i32(r.sequence_no),
            red_fighter_id: r.red_fighter_id,
            blue_fighter_id: r.blue_fighter_id,
            winner_id: r.winner_fighter_id.filter(|id| *id != 0),
            method: r.method.unwrap_or_default(),
            round: r.round.map(clamp_i32).unwrap_or(0),
            time_sec: r.time_sec.map(clamp_i32).unwrap_or(0),
            result_text: r.result.unwrap_or_default(),
        }
    }
}

/// Zero (or anything before the epoch) is how the seeding pipeline writes an
/// unknown start.
pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Empty text is stored as NULL.
pub fn null_if_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Zero and negative numbers are stored as NULL.
pub fn null_if_zero(v: i64) -> Option<i64> {
    (v > 0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> EventRow {
        EventRow {
            id: 5,
            name: "UFC 326".to_string(),
            status: status.to_string(),
            starts_at: Some(1_771_855_200),
            venue: "T-Mobile Arena".to_string(),
            external_url: None,
        }
    }

    #[test]
    fn unknown_stored_status_is_rejected() {
        assert!(matches!(row("postponed").into_tracked(), Err(AppError::InvalidStatus(_))));
        assert_eq!(row("live").into_tracked().unwrap().status, EventStatus::Live);
    }

    #[test]
    fn missing_external_url_becomes_empty_ref() {
        let tracked = row("scheduled").into_tracked().unwrap();
        assert_eq!(tracked.external_ref, "");
        assert!(!tracked.is_trackable());
    }

    #[test]
    fn null_outcome_columns_read_as_no_signal() {
        let snap = BoutSnapshot::from(BoutRow {
            id: 1,
            sequence_no: 3,
            red_fighter_id: 20,
            blue_fighter_id: 21,
            winner_fighter_id: Some(0),
            method: None,
            round: None,
            time_sec: None,
            result: None,
        });
        assert_eq!(snap.winner_id, None);
        assert!(!snap.outcome().has_signal());
    }

    #[test]
    fn zero_start_is_unknown() {
        let mut r = row("live");
        r.starts_at = Some(0);
        assert_eq!(r.clone().into_tracked().unwrap().starts_at, None);
        assert_eq!(r.into_summary().unwrap().starts_at, None);
        assert_eq!(from_unix(-5), None);
        assert!(from_unix(1_771_855_200).is_some());
    }

    #[test]
    fn empty_and_zero_map_to_null() {
        assert_eq!(null_if_empty("  "), None);
        assert_eq!(null_if_empty(" KO "), Some("KO"));
        assert_eq!(null_if_zero(0), None);
        assert_eq!(null_if_zero(3), Some(3));
    }
}
