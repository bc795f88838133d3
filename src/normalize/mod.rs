//! Match normalization.
//!
//! Converts raw fetched events into [`Match`] records. A set that fails
//! validation is skipped with a warning and recorded in the
//! [`NormalizeReport`]; the batch always runs to completion.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{BestOf, Match, RawEntrant, RawEvent, RawSet, RawStanding};

/// Reasons a raw set cannot become a match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("set has no id")]
    MissingId,

    #[error("expected two slots, found {0}")]
    MissingSlot(usize),

    #[error("slot {0} has no entrant")]
    MissingEntrant(usize),

    #[error("missing set score data")]
    MissingScore,

    #[error("invalid placement data ({0:?}, {1:?})")]
    InvalidPlacement(Option<u32>, Option<u32>),

    #[error("invalid score {0}-{1}")]
    InvalidScore(i64, i64),
}

/// Event-level metadata shared by every set of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub tournament_name: String,
    pub event_name: String,
    pub event_id: u64,
    pub start_at: i64,
}

impl EventMeta {
    /// Extract metadata, `None` when a required field is missing or empty.
    pub fn from_raw(event: &RawEvent) -> Option<Self> {
        let tournament_name = event.tournament_name.as_deref().filter(|s| !s.is_empty())?;
        let event_name = event.event_name.as_deref().filter(|s| !s.is_empty())?;
        let event_id = event.event_id?;

        Some(Self {
            tournament_name: tournament_name.to_string(),
            event_name: event_name.to_string(),
            event_id,
            start_at: event.start_at.unwrap_or(0),
        })
    }
}

/// A set that was dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSet {
    pub event_key: String,
    pub set_id: Option<u64>,
    pub reason: NormalizeError,
}

/// Outcome of normalizing a batch of events.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub matches: Vec<Match>,
    pub skipped_sets: Vec<SkippedSet>,
    /// Keys of events missing required metadata
    pub skipped_events: Vec<String>,
}

impl NormalizeReport {
    pub fn sets_seen(&self) -> usize {
        self.matches.len() + self.skipped_sets.len()
    }
}

/// Normalize every event in a batch.
pub fn normalize_events<'a, I>(events: I) -> NormalizeReport
where
    I: IntoIterator<Item = (&'a String, &'a RawEvent)>,
{
    let mut report = NormalizeReport::default();

    for (key, event) in events {
        normalize_event(key, event, &mut report);
    }

    info!(
        "Normalized {} matches ({} sets skipped, {} events skipped)",
        report.matches.len(),
        report.skipped_sets.len(),
        report.skipped_events.len()
    );

    report
}

/// Normalize one event's sets into `report`.
pub fn normalize_event(key: &str, event: &RawEvent, report: &mut NormalizeReport) {
    let (Some(meta), Some(sets)) = (EventMeta::from_raw(event), event.sets.as_ref()) else {
        warn!("Incomplete event data for key {}. Skipping event.", key);
        report.skipped_events.push(key.to_string());
        return;
    };

    debug!("Normalizing {} sets from {}", sets.len(), meta.event_name);

    for set in sets {
        match normalize_set(&meta, set) {
            Ok(m) => report.matches.push(m),
            Err(reason) => {
                warn!(
                    "Skipping set {:?} in event {}: {}",
                    set.id, meta.event_name, reason
                );
                report.skipped_sets.push(SkippedSet {
                    event_key: key.to_string(),
                    set_id: set.id,
                    reason,
                });
            }
        }
    }
}

/// Convert one raw set, deciding winner and loser strictly by placement.
pub fn normalize_set(meta: &EventMeta, set: &RawSet) -> Result<Match, NormalizeError> {
    let set_id = set.id.ok_or(NormalizeError::MissingId)?;

    if set.slots.len() < 2 {
        return Err(NormalizeError::MissingSlot(set.slots.len()));
    }
    let score = set.set_score.as_ref().ok_or(NormalizeError::MissingScore)?;

    let entrant1 = entrant(set, 0)?;
    let entrant2 = entrant(set, 1)?;

    let standing1 = standing(score.slots.first())?;
    let standing2 = standing(score.slots.get(1))?;

    let score1 = standing1.score_value().ok_or(NormalizeError::MissingScore)?;
    let score2 = standing2.score_value().ok_or(NormalizeError::MissingScore)?;

    // Both standings must be placed, and exactly one of them first.
    let (winner, loser, winner_score, loser_score) =
        match (standing1.placement, standing2.placement) {
            (Some(1), Some(p2)) if p2 != 1 => (entrant1, entrant2, score1, score2),
            (Some(p1), Some(1)) if p1 != 1 => (entrant2, entrant1, score2, score1),
            (p1, p2) => return Err(NormalizeError::InvalidPlacement(p1, p2)),
        };

    let (winner_score, loser_score) = games(winner_score, loser_score)?;

    // A zero completion time on the set falls through to the score structure.
    let completed_at = set
        .completed_at
        .filter(|&t| t > 0)
        .or(score.completed_at.filter(|&t| t > 0))
        .unwrap_or(0);

    Ok(Match {
        set_id,
        tournament_name: meta.tournament_name.clone(),
        event_name: meta.event_name.clone(),
        event_id: meta.event_id,
        event_start_at: meta.start_at,
        completed_at,
        winner_id: winner.0,
        winner_name: winner.1,
        loser_id: loser.0,
        loser_name: loser.1,
        winner_score,
        loser_score,
        best_of: BestOf::from_winner_score(winner_score),
    })
}

/// Game counts of a decided set. Rejects negative scores (disqualifications)
/// and anything a best-of-5 cannot end with.
fn games(winner_score: i64, loser_score: i64) -> Result<(u32, u32), NormalizeError> {
    let in_range = |value: i64| {
        u32::try_from(value)
            .ok()
            .filter(|&games| games <= BestOf::Bo5.games_to_win())
    };

    match (in_range(winner_score), in_range(loser_score)) {
        (Some(won), Some(lost)) if won > lost => Ok((won, lost)),
        _ => Err(NormalizeError::InvalidScore(winner_score, loser_score)),
    }
}

fn entrant(set: &RawSet, slot: usize) -> Result<(u64, String), NormalizeError> {
    match set.slots.get(slot).and_then(|s| s.entrant.as_ref()) {
        Some(RawEntrant {
            id: Some(id),
            name: Some(name),
        }) if !name.trim().is_empty() => Ok((*id, name.clone())),
        _ => Err(NormalizeError::MissingEntrant(slot)),
    }
}

fn standing(slot: Option<&crate::models::RawScoreSlot>) -> Result<&RawStanding, NormalizeError> {
    slot.and_then(|s| s.standing.as_ref())
        .filter(|s| s.stats.is_some())
        .ok_or(NormalizeError::MissingScore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        RawEventMap, RawScore, RawScoreSlot, RawSetScore, RawSlot, RawStandingStats,
    };

    fn slot(id: u64, name: &str) -> RawSlot {
        RawSlot {
            entrant: Some(RawEntrant {
                id: Some(id),
                name: Some(name.to_string()),
            }),
        }
    }

    fn score_slot(placement: u32, value: i64) -> RawScoreSlot {
        RawScoreSlot {
            standing: Some(RawStanding {
                placement: Some(placement),
                stats: Some(RawStandingStats {
                    score: Some(RawScore { value: Some(value) }),
                }),
            }),
        }
    }

    fn raw_set(id: u64, p1: (u32, i64), p2: (u32, i64)) -> RawSet {
        RawSet {
            id: Some(id),
            slots: vec![slot(1, "TAG | Alice"), slot(2, "Bob")],
            set_score: Some(RawSetScore {
                completed_at: Some(1_700_000_500),
                slots: vec![score_slot(p1.0, p1.1), score_slot(p2.0, p2.1)],
            }),
            completed_at: Some(1_700_000_600),
        }
    }

    fn meta() -> EventMeta {
        EventMeta {
            tournament_name: "Weekly 12".to_string(),
            event_name: "Singles".to_string(),
            event_id: 901,
            start_at: 1_700_000_000,
        }
    }

    fn raw_event(sets: Vec<RawSet>) -> RawEvent {
        RawEvent {
            tournament_name: Some("Weekly 12".to_string()),
            event_name: Some("Singles".to_string()),
            event_id: Some(901),
            start_at: Some(1_700_000_000),
            sets: Some(sets),
        }
    }

    #[test]
    fn test_normalize_set_slot_one_wins() {
        let m = normalize_set(&meta(), &raw_set(7, (1, 3), (2, 1))).unwrap();
        assert_eq!(m.set_id, 7);
        assert_eq!(m.winner_name, "TAG | Alice");
        assert_eq!(m.loser_name, "Bob");
        assert_eq!(m.winner_score, 3);
        assert_eq!(m.loser_score, 1);
        assert_eq!(m.best_of, BestOf::Bo5);
        assert_eq!(m.completed_at, 1_700_000_600);
        assert_eq!(m.event_id, 901);
    }

    #[test]
    fn test_normalize_set_slot_two_wins() {
        let m = normalize_set(&meta(), &raw_set(7, (2, 0), (1, 2))).unwrap();
        assert_eq!(m.winner_name, "Bob");
        assert_eq!(m.winner_id, 2);
        assert_eq!(m.loser_name, "TAG | Alice");
        assert_eq!(m.winner_score, 2);
        assert_eq!(m.loser_score, 0);
        assert_eq!(m.best_of, BestOf::Bo3);
    }

    #[test]
    fn test_normalize_set_placement_ambiguity() {
        let both = normalize_set(&meta(), &raw_set(7, (1, 2), (1, 1)));
        assert_eq!(
            both.unwrap_err(),
            NormalizeError::InvalidPlacement(Some(1), Some(1))
        );

        let neither = normalize_set(&meta(), &raw_set(7, (2, 2), (3, 1)));
        assert!(matches!(
            neither.unwrap_err(),
            NormalizeError::InvalidPlacement(_, _)
        ));
    }

    #[test]
    fn test_normalize_set_rejects_disqualification_scores() {
        let dq = normalize_set(&meta(), &raw_set(7, (1, 0), (2, -1)));
        assert_eq!(dq.unwrap_err(), NormalizeError::InvalidScore(0, -1));
    }

    #[test]
    fn test_normalize_set_rejects_scores_that_do_not_fit() {
        let wrapped = normalize_set(&meta(), &raw_set(7, (1, 4_294_967_296), (2, 1)));
        assert_eq!(
            wrapped.unwrap_err(),
            NormalizeError::InvalidScore(4_294_967_296, 1)
        );

        let beyond_bo5 = normalize_set(&meta(), &raw_set(7, (1, 4), (2, 0)));
        assert_eq!(beyond_bo5.unwrap_err(), NormalizeError::InvalidScore(4, 0));

        let level = normalize_set(&meta(), &raw_set(7, (1, 2), (2, 2)));
        assert_eq!(level.unwrap_err(), NormalizeError::InvalidScore(2, 2));
    }

    #[test]
    fn test_normalize_set_requires_both_placements() {
        let mut set = raw_set(7, (1, 2), (2, 0));
        if let Some(standing) = set
            .set_score
            .as_mut()
            .and_then(|score| score.slots[1].standing.as_mut())
        {
            standing.placement = None;
        }
        assert_eq!(
            normalize_set(&meta(), &set).unwrap_err(),
            NormalizeError::InvalidPlacement(Some(1), None)
        );
    }

    #[test]
    fn test_normalize_set_missing_entrant() {
        let mut set = raw_set(7, (1, 2), (2, 0));
        set.slots[1].entrant = None;
        assert_eq!(
            normalize_set(&meta(), &set).unwrap_err(),
            NormalizeError::MissingEntrant(1)
        );
    }

    #[test]
    fn test_normalize_set_missing_score() {
        let mut set = raw_set(7, (1, 2), (2, 0));
        set.set_score = None;
        assert_eq!(
            normalize_set(&meta(), &set).unwrap_err(),
            NormalizeError::MissingScore
        );

        let mut set = raw_set(7, (1, 2), (2, 0));
        if let Some(score) = set.set_score.as_mut() {
            score.slots.pop();
        }
        assert_eq!(
            normalize_set(&meta(), &set).unwrap_err(),
            NormalizeError::MissingScore
        );
    }

    #[test]
    fn test_normalize_set_missing_slot() {
        let mut set = raw_set(7, (1, 2), (2, 0));
        set.slots.truncate(1);
        assert_eq!(
            normalize_set(&meta(), &set).unwrap_err(),
            NormalizeError::MissingSlot(1)
        );
    }

    #[test]
    fn test_completed_at_fallbacks() {
        let mut set = raw_set(7, (1, 2), (2, 0));
        set.completed_at = None;
        assert_eq!(normalize_set(&meta(), &set).unwrap().completed_at, 1_700_000_500);

        set.completed_at = Some(0);
        assert_eq!(normalize_set(&meta(), &set).unwrap().completed_at, 1_700_000_500);

        if let Some(score) = set.set_score.as_mut() {
            score.completed_at = None;
        }
        assert_eq!(normalize_set(&meta(), &set).unwrap().completed_at, 0);
    }

    #[test]
    fn test_malformed_set_does_not_change_match_count() {
        let good = vec![raw_set(1, (1, 2), (2, 0)), raw_set(2, (2, 1), (1, 2))];
        let mut broken = raw_set(3, (1, 2), (2, 0));
        broken.slots[0].entrant = None;

        let mut clean = RawEventMap::new();
        clean.insert("weekly-12".to_string(), raw_event(good.clone()));

        let mut dirty = RawEventMap::new();
        let mut with_broken = good;
        with_broken.insert(1, broken);
        dirty.insert("weekly-12".to_string(), raw_event(with_broken));

        let clean_report = normalize_events(&clean);
        let dirty_report = normalize_events(&dirty);

        assert_eq!(clean_report.matches.len(), 2);
        assert_eq!(dirty_report.matches.len(), 2);
        assert_eq!(dirty_report.skipped_sets.len(), 1);
        assert_eq!(dirty_report.skipped_sets[0].set_id, Some(3));
        assert_eq!(dirty_report.sets_seen(), 3);
    }

    #[test]
    fn test_null_slots_skip_only_that_set() {
        let good = serde_json::to_value(raw_set(1, (1, 2), (2, 0))).unwrap();
        let json = serde_json::json!({
            "weekly-12": {
                "tournamentName": "Weekly 12",
                "eventName": "Singles",
                "eventId": 901,
                "sets": [{"id": 5, "slots": null}, good, {"id": 6, "slots": [null]}]
            }
        });
        let events: RawEventMap = serde_json::from_value(json).unwrap();

        let report = normalize_events(&events);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].set_id, 1);
        assert_eq!(report.skipped_sets.len(), 2);
        assert_eq!(report.skipped_sets[0].set_id, Some(5));
        assert_eq!(report.skipped_sets[0].reason, NormalizeError::MissingSlot(0));
    }

    #[test]
    fn test_events_normalize_in_fetch_order() {
        let mut events = RawEventMap::new();
        events.insert("zeta", raw_event(vec![raw_set(1, (1, 2), (2, 0))]));
        events.insert("alpha", raw_event(vec![raw_set(2, (1, 2), (2, 0))]));

        let ids: Vec<u64> = normalize_events(&events)
            .matches
            .iter()
            .map(|m| m.set_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_incomplete_event_is_skipped() {
        let mut events = RawEventMap::new();
        let mut event = raw_event(vec![raw_set(1, (1, 2), (2, 0))]);
        event.event_id = None;
        events.insert("broken".to_string(), event);
        events.insert("ok".to_string(), raw_event(vec![raw_set(2, (1, 2), (2, 1))]));

        let report = normalize_events(&events);
        assert_eq!(report.skipped_events, vec!["broken".to_string()]);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].set_id, 2);
    }

    #[test]
    fn test_missing_start_at_defaults_to_zero() {
        let mut event = raw_event(vec![]);
        event.start_at = None;
        assert_eq!(EventMeta::from_raw(&event).unwrap().start_at, 0);
    }
}
