//! Head-to-head history between two players.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::QueryError;
use crate::identity::IdentityResolver;
use crate::models::{BestOf, HeadToHeadEntry, HeadToHeadIndex};

/// How "most recent events" are ranked for [`HeadToHeadFilter::last_n_events`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventRanking {
    /// Highest event id first
    #[default]
    EventId,
    /// Latest event start first, ties by event id
    EventStart,
}

impl fmt::Display for EventRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRanking::EventId => write!(f, "event-id"),
            EventRanking::EventStart => write!(f, "event-start"),
        }
    }
}

impl FromStr for EventRanking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event-id" | "id" => Ok(EventRanking::EventId),
            "event-start" | "start" => Ok(EventRanking::EventStart),
            other => Err(format!("unknown event ranking: {}", other)),
        }
    }
}

/// Optional restrictions on a head-to-head history, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadToHeadFilter {
    pub best_of: Option<BestOf>,
    /// Keep only the trailing N meetings, after every other filter
    pub last_n_matches: Option<usize>,
    /// Keep only meetings from the N most recent distinct events
    pub last_n_events: Option<usize>,
    /// Inclusive lower bound on `completedAt`
    pub since: Option<i64>,
    /// Inclusive upper bound on `completedAt`
    pub before: Option<i64>,
    pub event_ranking: EventRanking,
}

impl HeadToHeadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_of(mut self, best_of: BestOf) -> Self {
        self.best_of = Some(best_of);
        self
    }

    pub fn last_n_matches(mut self, n: usize) -> Self {
        self.last_n_matches = Some(n);
        self
    }

    pub fn last_n_events(mut self, n: usize) -> Self {
        self.last_n_events = Some(n);
        self
    }

    pub fn since(mut self, completed_at: i64) -> Self {
        self.since = Some(completed_at);
        self
    }

    pub fn before(mut self, completed_at: i64) -> Self {
        self.before = Some(completed_at);
        self
    }

    pub fn ranked_by(mut self, ranking: EventRanking) -> Self {
        self.event_ranking = ranking;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.last_n_matches == Some(0) {
            return Err(QueryError::invalid("lastNMatches must be at least 1"));
        }
        if self.last_n_events == Some(0) {
            return Err(QueryError::invalid("lastNEvents must be at least 1"));
        }
        if let (Some(since), Some(before)) = (self.since, self.before) {
            if since > before {
                return Err(QueryError::invalid(format!(
                    "since ({}) is after before ({})",
                    since, before
                )));
            }
        }
        Ok(())
    }

    fn keeps(&self, entry: &HeadToHeadEntry) -> bool {
        self.best_of.map_or(true, |b| entry.best_of == b)
            && self.since.map_or(true, |s| entry.completed_at >= s)
            && self.before.map_or(true, |b| entry.completed_at <= b)
    }
}

/// Meetings of `player` against `opponent`, from `player`'s side, oldest first.
///
/// Both names are resolved to canonical identities first, so any alias
/// returns the combined history.
pub fn query_head_to_head(
    index: &HeadToHeadIndex,
    resolver: &IdentityResolver<'_>,
    player: &str,
    opponent: &str,
    filter: &HeadToHeadFilter,
) -> Result<Vec<HeadToHeadEntry>, QueryError> {
    filter.validate()?;

    let player = resolver.resolve_canonical(player);
    let opponent = resolver.resolve_canonical(opponent);

    let mut entries: Vec<HeadToHeadEntry> = index
        .entries(&player, &opponent)
        .iter()
        .filter(|e| filter.keeps(e))
        .cloned()
        .collect();

    if let Some(n) = filter.last_n_events {
        let recent = recent_events(&entries, n, filter.event_ranking);
        entries.retain(|e| recent.contains(&e.event_id));
    }

    if let Some(n) = filter.last_n_matches {
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
    }

    debug!(
        "Head-to-head {} vs {}: {} meetings after filters",
        player,
        opponent,
        entries.len()
    );

    Ok(entries)
}

/// Ids of the `n` most recent distinct events among `entries`.
fn recent_events(entries: &[HeadToHeadEntry], n: usize, ranking: EventRanking) -> BTreeSet<u64> {
    let mut events: Vec<(i64, u64)> = entries
        .iter()
        .map(|e| match ranking {
            EventRanking::EventId => (0, e.event_id),
            EventRanking::EventStart => (e.event_start_at, e.event_id),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    events.reverse();
    events.into_iter().take(n).map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::aggregate::test_support::*;
    use crate::aggregate::{run, AggregateOptions};
    use crate::identity::AliasTable;
    use crate::models::{Match, MatchResult};

    fn index_for(matches: &[Match], aliases: &AliasTable) -> HeadToHeadIndex {
        run(matches, aliases, &AggregateOptions::new(reference())).head_to_head
    }

    fn set_ids(entries: &[HeadToHeadEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.set_id).collect()
    }

    #[test]
    fn test_best_of_filter() {
        let aliases = AliasTable::new();
        let index = index_for(&three_match_scenario(), &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let filter = HeadToHeadFilter::new().best_of("Best of 3".parse().unwrap());
        let entries = query_head_to_head(&index, &resolver, "P1", "P2", &filter).unwrap();
        assert_eq!(set_ids(&entries), vec![3]);
        assert_eq!(entries[0].result, MatchResult::Win);
        assert_eq!(entries[0].score.to_string(), "2-0");
    }

    #[test]
    fn test_alias_lookup_returns_combined_history() {
        let aliases: AliasTable = [("P-One", "P1")].into_iter().collect();
        let mut matches = three_match_scenario();
        matches.push(match_at(4, "P-One", "P2", (2, 1), 1));
        let index = index_for(&matches, &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let entries =
            query_head_to_head(&index, &resolver, "Tag | P-One", "P2", &HeadToHeadFilter::new())
                .unwrap();
        assert_eq!(set_ids(&entries), vec![1, 2, 3, 4]);

        let mirrored =
            query_head_to_head(&index, &resolver, "P2", "P1", &HeadToHeadFilter::new()).unwrap();
        assert_eq!(mirrored.len(), 4);
        assert_eq!(mirrored[0].score.to_string(), "0-3");
    }

    #[test]
    fn test_unknown_pair_is_empty() {
        let aliases = AliasTable::new();
        let index = index_for(&three_match_scenario(), &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let entries =
            query_head_to_head(&index, &resolver, "P1", "Ghost", &HeadToHeadFilter::new()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_last_n_matches_applies_after_other_filters() {
        let aliases = AliasTable::new();
        let index = index_for(&three_match_scenario(), &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let filter = HeadToHeadFilter::new()
            .best_of(BestOf::Bo5)
            .last_n_matches(1);
        let entries = query_head_to_head(&index, &resolver, "P1", "P2", &filter).unwrap();
        assert_eq!(set_ids(&entries), vec![2]);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let aliases = AliasTable::new();
        let matches = three_match_scenario();
        let index = index_for(&matches, &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let filter = HeadToHeadFilter::new()
            .since(matches[1].completed_at)
            .before(matches[2].completed_at);
        let entries = query_head_to_head(&index, &resolver, "P1", "P2", &filter).unwrap();
        assert_eq!(set_ids(&entries), vec![2, 3]);
    }

    #[test]
    fn test_last_n_events_ranking() {
        let aliases = AliasTable::new();
        let mut matches = three_match_scenario();
        // Highest id but the oldest event
        matches[0].event_id = 999;
        let index = index_for(&matches, &aliases);
        let resolver = IdentityResolver::new(&aliases);

        let by_id = HeadToHeadFilter::new().last_n_events(1);
        let entries = query_head_to_head(&index, &resolver, "P1", "P2", &by_id).unwrap();
        assert_eq!(set_ids(&entries), vec![1]);

        let by_start = by_id.ranked_by(EventRanking::EventStart);
        let entries = query_head_to_head(&index, &resolver, "P1", "P2", &by_start).unwrap();
        assert_eq!(set_ids(&entries), vec![3]);
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let aliases = AliasTable::new();
        let index = HeadToHeadIndex::new();
        let resolver = IdentityResolver::new(&aliases);

        for filter in [
            HeadToHeadFilter::new().last_n_matches(0),
            HeadToHeadFilter::new().last_n_events(0),
            HeadToHeadFilter::new().since(10).before(5),
        ] {
            let result = query_head_to_head(&index, &resolver, "A", "B", &filter);
            assert!(matches!(result, Err(QueryError::InvalidArgument(_))));
        }
    }
}
