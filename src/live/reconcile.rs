//! Status inference from a fetched snapshot. Pure: no I/O, no clock reads.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{EventStatus, FetchedBout, FighterId};

/// Maps the feed's raw status token plus timing and bout evidence onto a
/// canonical status.
///
/// A `live` token is downgraded to `completed` once the start is older than
/// `stale_window`, so an event whose page never reports a final state still
/// terminates.
pub fn reconcile_status(
    raw: &str,
    starts_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    bouts: &[FetchedBout],
    stale_window: Duration,
) -> EventStatus {
    let stale = is_stale(starts_at, now, stale_window);
    match raw.trim().to_ascii_lowercase().as_str() {
        "completed" | "final" => EventStatus::Completed,
        "live" => {
            if stale {
                EventStatus::Completed
            } else {
                EventStatus::Live
            }
        }
        "scheduled" | "upcoming" => match starts_at {
            None => EventStatus::Scheduled,
            Some(t) if t > now => EventStatus::Scheduled,
            Some(_) if stale => EventStatus::Completed,
            Some(_) => EventStatus::Live,
        },
        _ => {
            if all_bouts_resolved(bouts) {
                return EventStatus::Completed;
            }
            match starts_at {
                None => EventStatus::Live,
                Some(t) if t > now => EventStatus::Scheduled,
                Some(_) if stale => EventStatus::Completed,
                Some(_) => EventStatus::Live,
            }
        }
    }
}

/// True when the start is known and strictly older than `now - window`.
pub fn is_stale(starts_at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(starts_at) = starts_at else {
        return false;
    };
    match chrono::Duration::from_std(window) {
        Ok(window) => now
            .checked_sub_signed(window)
            .is_some_and(|cutoff| starts_at < cutoff),
        Err(_) => false,
    }
}

/// Resolves a corner token to one of the bout's fighter ids. Anything other
/// than `red`/`blue` is undecided; an id is never invented.
pub fn winner_id_by_side(side: &str, red_id: FighterId, blue_id: FighterId) -> Option<FighterId> {
    let id = match side.trim().to_ascii_lowercase().as_str() {
        "red" => red_id,
        "blue" => blue_id,
        _ => return None,
    };
    (id != 0).then_some(id)
}

/// Every bout has some outcome evidence. An empty card is never resolved.
pub fn all_bouts_resolved(bouts: &[FetchedBout]) -> bool {
    !bouts.is_empty() && bouts.iter().all(bout_resolved)
}

fn bout_resolved(bout: &FetchedBout) -> bool {
    winner_id_by_side(&bout.winner_side, 1, 2).is_some()
        || !bout.result_text.trim().is_empty()
        || !bout.method.trim().is_empty()
        || bout.round > 0
        || bout.time_sec > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const STALE: Duration = Duration::from_secs(18 * 3600);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 23, 14, 0, 0).unwrap()
    }

    fn ago(minutes: i64) -> Option<DateTime<Utc>> {
        Some(now() - chrono::Duration::minutes(minutes))
    }

    fn decided(side: &str) -> FetchedBout {
        FetchedBout { winner_side: side.to_string(), ..Default::default() }
    }

    #[test]
    fn final_tokens_complete_regardless_of_case() {
        for raw in ["completed", "FINAL", "  Final  "] {
            assert_eq!(reconcile_status(raw, ago(20), now(), &[], STALE), EventStatus::Completed);
        }
    }

    #[test]
    fn live_token_stays_live_inside_window() {
        assert_eq!(reconcile_status("live", ago(20), now(), &[], STALE), EventStatus::Live);
        assert_eq!(reconcile_status("Live", None, now(), &[], STALE), EventStatus::Live);
    }

    #[test]
    fn live_token_completes_past_stale_window() {
        assert_eq!(
            reconcile_status("live", ago(48 * 60), now(), &[], STALE),
            EventStatus::Completed
        );
    }

    #[test]
    fn upcoming_token_follows_start_time() {
        assert_eq!(reconcile_status("upcoming", None, now(), &[], STALE), EventStatus::Scheduled);
        assert_eq!(
            reconcile_status("scheduled", Some(now() + chrono::Duration::hours(2)), now(), &[], STALE),
            EventStatus::Scheduled
        );
        assert_eq!(reconcile_status("scheduled", ago(30), now(), &[], STALE), EventStatus::Live);
        assert_eq!(
            reconcile_status("upcoming", ago(19 * 60), now(), &[], STALE),
            EventStatus::Completed
        );
    }

    #[test]
    fn unknown_token_uses_bout_evidence() {
        let bouts = vec![
            decided("red"),
            FetchedBout { method: "Decision".to_string(), ..Default::default() },
        ];
        assert_eq!(reconcile_status("", ago(20), now(), &bouts, STALE), EventStatus::Completed);

        let partial = vec![decided("blue"), FetchedBout::default()];
        assert_eq!(reconcile_status("???", ago(20), now(), &partial, STALE), EventStatus::Live);
    }

    #[test]
    fn unknown_token_without_evidence_falls_back_to_timing() {
        assert_eq!(reconcile_status("", None, now(), &[], STALE), EventStatus::Live);
        assert_eq!(
            reconcile_status("", Some(now() + chrono::Duration::minutes(5)), now(), &[], STALE),
            EventStatus::Scheduled
        );
        assert_eq!(reconcile_status("", ago(20 * 60), now(), &[], STALE), EventStatus::Completed);
    }

    #[test]
    fn unrecognised_side_is_not_evidence() {
        let bouts = vec![decided("draw?")];
        assert_eq!(reconcile_status("", ago(20), now(), &bouts, STALE), EventStatus::Live);
    }

    #[test]
    fn winner_side_maps_to_stored_pairing() {
        assert_eq!(winner_id_by_side("red", 20, 21), Some(20));
        assert_eq!(winner_id_by_side(" BLUE ", 20, 21), Some(21));
        assert_eq!(winner_id_by_side("", 20, 21), None);
        assert_eq!(winner_id_by_side("green", 20, 21), None);
        assert_eq!(winner_id_by_side("red", 0, 21), None);
    }

    #[test]
    fn status_never_regresses_when_folded_with_advance() {
        let inputs: [(&str, Option<DateTime<Utc>>); 5] = [
            ("upcoming", None),
            ("live", ago(10)),
            ("final", ago(60)),
            ("live", ago(90)),
            ("scheduled", Some(now() + chrono::Duration::hours(1))),
        ];
        let mut status = EventStatus::Scheduled;
        let mut seen = Vec::new();
        for (raw, starts_at) in inputs {
            status = status.advance(reconcile_status(raw, starts_at, now(), &[], STALE));
            seen.push(status);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "regressed: {seen:?}");
        assert_eq!(status, EventStatus::Completed);
    }

    #[test]
    fn stale_requires_known_start() {
        assert!(!is_stale(None, now(), STALE));
        assert!(!is_stale(ago(18 * 60), now(), STALE));
        assert!(is_stale(ago(18 * 60 + 1), now(), STALE));
    }
}
