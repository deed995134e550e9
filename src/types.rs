use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EventId = i64;
pub type BoutId = i64;
pub type FighterId = i64;

// ---------------------------------------------------------------------------
// Event lifecycle
// ---------------------------------------------------------------------------

/// Canonical lifecycle status. Variant order is the only legal direction of
/// travel: `Scheduled < Live < Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Live,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Live => "live",
            EventStatus::Completed => "completed",
        }
    }

    /// Parses a stored status column. Only the three canonical spellings are
    /// accepted; feed tokens go through `live::reconcile` instead.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(EventStatus::Scheduled),
            "live" => Some(EventStatus::Live),
            "completed" => Some(EventStatus::Completed),
            _ => None,
        }
    }

    pub fn rank(self) -> i64 {
        self as i64
    }

    /// Never moves backwards: returns whichever of the two is further along.
    pub fn advance(self, next: EventStatus) -> EventStatus {
        self.max(next)
    }

    pub fn is_trackable(self) -> bool {
        matches!(self, EventStatus::Scheduled | EventStatus::Live)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TrackedEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub id: EventId,
    pub status: EventStatus,
    /// None when the start time is unknown.
    pub starts_at: Option<DateTime<Utc>>,
    pub external_ref: String,
}

impl TrackedEvent {
    pub fn is_trackable(&self) -> bool {
        !self.external_ref.trim().is_empty() && self.status.is_trackable()
    }

    /// True when the start time is known and not in the future.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_some_and(|t| t <= now)
    }
}

// ---------------------------------------------------------------------------
// Bouts
// ---------------------------------------------------------------------------

/// The mutable part of a bout row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoutOutcome {
    /// None = undecided.
    pub winner_id: Option<FighterId>,
    pub method: String,
    pub round: i32,
    pub time_sec: i32,
    pub result_text: String,
}

impl BoutOutcome {
    /// Trims text fields and clamps negative counters so that two outcomes
    /// describing the same result compare equal.
    pub fn normalized(self) -> Self {
        Self {
            winner_id: self.winner_id.filter(|id| *id != 0),
            method: self.method.trim().to_string(),
            round: self.round.max(0),
            time_sec: self.time_sec.max(0),
            result_text: self.result_text.trim().to_string(),
        }
    }

    /// False when the outcome says nothing at all about how the bout ended.
    pub fn has_signal(&self) -> bool {
        self.winner_id.is_some()
            || !self.method.trim().is_empty()
            || self.round > 0
            || self.time_sec > 0
            || !self.result_text.trim().is_empty()
    }
}

/// Stored bout row as seen by the live engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoutSnapshot {
    pub bout_id: BoutId,
    pub sequence_no: i32,
    pub red_fighter_id: FighterId,
    pub blue_fighter_id: FighterId,
    pub winner_id: Option<FighterId>,
    pub method: String,
    pub round: i32,
    pub time_sec: i32,
    pub result_text: String,
}

impl BoutSnapshot {
    pub fn outcome(&self) -> BoutOutcome {
        BoutOutcome {
            winner_id: self.winner_id,
            method: self.method.clone(),
            round: self.round,
            time_sec: self.time_sec,
            result_text: self.result_text.clone(),
        }
        .normalized()
    }
}

// ---------------------------------------------------------------------------
// Fetched snapshot
// ---------------------------------------------------------------------------

/// One bout as reported by the external feed. The feed has no stable bout
/// ids, so the winner is a corner token rather than a fighter id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedBout {
    #[serde(default, alias = "winnerSide")]
    pub winner_side: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub round: i32,
    #[serde(default, alias = "timeSec")]
    pub time_sec: i32,
    #[serde(default, alias = "result", alias = "resultText")]
    pub result_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub bouts: Vec<FetchedBout>,
}

// ---------------------------------------------------------------------------
// Read models (API / cache)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: EventId,
    pub name: String,
    pub status: EventStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub venue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCard {
    #[serde(flatten)]
    pub event: EventSummary,
    pub bouts: Vec<BoutSnapshot>,
}
