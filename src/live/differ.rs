use crate::live::reconcile::winner_id_by_side;
use crate::types::{BoutId, BoutOutcome, BoutSnapshot, FetchedBout};

/// One bout whose stored outcome disagrees with the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoutChange {
    pub bout_id: BoutId,
    pub outcome: BoutOutcome,
}

/// Computes the minimal set of outcome writes needed to bring `stored` in
/// line with `fetched`.
///
/// Pairing is positional: fetched bout `i` is compared with stored bout `i`
/// (ordered by `sequence_no`). The feed exposes no stable bout ids, so a card
/// reordered upstream mid-event would pair the wrong bouts. Extra bouts on
/// either side are ignored.
pub fn diff_bouts(fetched: &[FetchedBout], stored: &[BoutSnapshot]) -> Vec<BoutChange> {
    fetched
        .iter()
        .zip(stored)
        .filter_map(|(src, current)| {
            let outcome = fetched_outcome(src, current);
            if !outcome.has_signal() || outcome == current.outcome() {
                return None;
            }
            Some(BoutChange { bout_id: current.bout_id, outcome })
        })
        .collect()
}

/// Translates a feed bout into the stored shape, resolving the winner corner
/// against the stored pairing.
pub fn fetched_outcome(src: &FetchedBout, current: &BoutSnapshot) -> BoutOutcome {
    BoutOutcome {
        winner_id: winner_id_by_side(&src.winner_side, current.red_fighter_id, current.blue_fighter_id),
        method: src.method.clone(),
        round: src.round,
        time_sec: src.time_sec,
        result_text: src.result_text.clone(),
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(bout_id: BoutId, seq: i32) -> BoutSnapshot {
        BoutSnapshot {
            bout_id,
            sequence_no: seq,
            red_fighter_id: 20 + seq as i64 * 2,
            blue_fighter_id: 21 + seq as i64 * 2,
            winner_id: None,
            method: String::new(),
            round: 0,
            time_sec: 0,
            result_text: String::new(),
        }
    }

    fn ko_red() -> FetchedBout {
        FetchedBout {
            winner_side: "red".to_string(),
            method: "KO/TKO".to_string(),
            round: 2,
            time_sec: 100,
            result_text: "KO/TKO R2 1:40".to_string(),
        }
    }

    #[test]
    fn decided_bout_produces_one_change() {
        let changes = diff_bouts(&[ko_red()], &[stored(1001, 0)]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].bout_id, 1001);
        assert_eq!(changes[0].outcome.winner_id, Some(20));
        assert_eq!(changes[0].outcome.method, "KO/TKO");
    }

    #[test]
    fn matching_outcome_is_a_no_op() {
        let mut current = stored(1001, 0);
        current.winner_id = Some(20);
        current.method = "KO/TKO ".to_string();
        current.round = 2;
        current.time_sec = 100;
        current.result_text = "KO/TKO R2 1:40".to_string();
        assert!(diff_bouts(&[ko_red()], &[current]).is_empty());
    }

    #[test]
    fn no_signal_bout_is_skipped() {
        let empty = FetchedBout { winner_side: "unknown".to_string(), ..Default::default() };
        assert!(diff_bouts(&[empty], &[stored(1001, 0)]).is_empty());
    }

    #[test]
    fn pairing_stops_at_shorter_list() {
        let fetched = vec![ko_red(), ko_red(), ko_red()];
        let changes = diff_bouts(&fetched, &[stored(1, 0), stored(2, 1)]);
        assert_eq!(changes.iter().map(|c| c.bout_id).collect::<Vec<_>>(), vec![1, 2]);

        assert!(diff_bouts(&[], &[stored(1, 0)]).is_empty());
    }

    #[test]
    fn blue_winner_uses_stored_blue_id() {
        let src = FetchedBout { winner_side: "Blue".to_string(), ..Default::default() };
        let changes = diff_bouts(&[src], &[stored(1, 1)]);
        assert_eq!(changes[0].outcome.winner_id, Some(23));
    }

    #[test]
    fn winner_cleared_upstream_is_still_written() {
        let mut current = stored(1, 0);
        current.winner_id = Some(20);
        current.method = "Decision".to_string();
        let src = FetchedBout { method: "Decision".to_string(), ..Default::default() };
        let changes = diff_bouts(&[src], &[current]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].outcome.winner_id, None);
    }
}
