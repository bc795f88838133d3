//! Player queries: filter, sort and paginate the statistics store.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::QueryError;
use crate::calculate::{calculate_win_rate, StreakTracker};
use crate::identity::IdentityResolver;
use crate::models::{
    BestOf, MatchResult, PerformanceTrend, PlayerMatch, PlayerStatistics, PlayerStatsStore,
    RateStats, Score, TimeWindow,
};

/// Page size used when the caller does not choose one.
pub const DEFAULT_LIMIT: usize = 10;

/// Inclusive range; a missing end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy + fmt::Display> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: T) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: T) -> Self {
        Self::new(None, Some(max))
    }

    pub fn between(min: T, max: T) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn validate(&self, what: &str) -> Result<(), QueryError> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(QueryError::invalid(format!(
                    "{}: minimum {} is above maximum {}",
                    what, min, max
                )));
            }
        }
        Ok(())
    }
}

impl Bounds<f64> {
    /// Percent bounds must lie in 0..=100.
    fn validate_percent(&self, what: &str) -> Result<(), QueryError> {
        for value in [self.min, self.max].into_iter().flatten() {
            if !(0.0..=100.0).contains(&value) {
                return Err(QueryError::invalid(format!(
                    "{}: {} is outside 0-100",
                    what, value
                )));
            }
        }
        self.validate(what)
    }
}

/// Period a player must have been active in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    /// Rolling window back from the store's reference time
    Window(TimeWindow),
    /// Calendar dates (UTC), both days included
    Custom { start: NaiveDate, end: NaiveDate },
}

impl TimePeriod {
    /// `completedAt` range covered by the period.
    pub fn range(&self, reference: DateTime<Utc>) -> (i64, Option<i64>) {
        match self {
            TimePeriod::Window(window) => (window.since(reference), None),
            TimePeriod::Custom { start, end } => {
                let start = start
                    .and_hms_opt(0, 0, 0)
                    .map_or(i64::MIN, |t| t.and_utc().timestamp());
                let end = end
                    .and_hms_opt(23, 59, 59)
                    .map_or(i64::MAX, |t| t.and_utc().timestamp());
                (start, Some(end))
            }
        }
    }

    fn validate(&self) -> Result<(), QueryError> {
        match self {
            TimePeriod::Custom { start, end } if start > end => Err(QueryError::invalid(format!(
                "date range starts {} after it ends {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }
}

/// One predicate of a player query. Predicates are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerFilter {
    SetsPlayed(Bounds<u32>),
    /// Percent, 0 to 100
    WinRate(Bounds<f64>),
    /// Matches if any opponent's overall win rate is in range
    OpponentWinRate(Bounds<f64>),
    /// Current win streak
    WinStreak(Bounds<u32>),
    /// At least one match completed in the period
    ActiveIn(TimePeriod),
    /// At least one match of the format
    MatchFormat(BestOf),
}

impl PlayerFilter {
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            PlayerFilter::SetsPlayed(bounds) => bounds.validate("sets played"),
            PlayerFilter::WinRate(bounds) => bounds.validate_percent("win rate"),
            PlayerFilter::OpponentWinRate(bounds) => bounds.validate_percent("opponent win rate"),
            PlayerFilter::WinStreak(bounds) => bounds.validate("win streak"),
            PlayerFilter::ActiveIn(period) => period.validate(),
            PlayerFilter::MatchFormat(_) => Ok(()),
        }
    }

    fn matches(&self, player: &PlayerStatistics, store: &PlayerStatsStore) -> bool {
        match self {
            PlayerFilter::SetsPlayed(bounds) => bounds.contains(player.matches_played),
            PlayerFilter::WinRate(bounds) => bounds.contains(player.win_rate),
            PlayerFilter::OpponentWinRate(bounds) => player
                .matches
                .iter()
                .map(|m| m.opponent_name.as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter_map(|opponent| store.get(opponent))
                .any(|opponent| bounds.contains(opponent.win_rate)),
            PlayerFilter::WinStreak(bounds) => bounds.contains(player.current_win_streak),
            PlayerFilter::ActiveIn(period) => {
                let (since, until) = period.range(store.reference_time());
                player.played_between(since, until)
            }
            PlayerFilter::MatchFormat(best_of) => {
                player.matches.iter().any(|m| m.best_of == *best_of)
            }
        }
    }
}

/// Numeric field a player query sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    SetsPlayed,
    WinRate,
    WinStreak,
}

impl SortField {
    fn compare(&self, a: &PlayerStatistics, b: &PlayerStatistics) -> Ordering {
        match self {
            SortField::SetsPlayed => a.matches_played.cmp(&b.matches_played),
            SortField::WinRate => a.win_rate.total_cmp(&b.win_rate),
            SortField::WinStreak => a.current_win_streak.cmp(&b.current_win_streak),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sets-played" | "sets" => Ok(SortField::SetsPlayed),
            "win-rate" | "winrate" => Ok(SortField::WinRate),
            "win-streak" | "streak" => Ok(SortField::WinStreak),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl PlayerSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    fn compare(&self, a: &PlayerStatistics, b: &PlayerStatistics) -> Ordering {
        match self.order {
            SortOrder::Ascending => self.field.compare(a, b),
            SortOrder::Descending => self.field.compare(b, a),
        }
    }
}

/// Pagination parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// First `limit` results.
    pub fn first(limit: usize) -> Self {
        Self {
            page: 1,
            page_size: limit,
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.page_size == 0 {
            return Err(QueryError::invalid("page size must be at least 1"));
        }
        if self.page == 0 {
            return Err(QueryError::invalid("pages start at 1"));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// Filter, sort and paginate players. Ties keep store order.
pub fn query_players<'s>(
    store: &'s PlayerStatsStore,
    filters: &[PlayerFilter],
    sort: Option<PlayerSort>,
    pagination: &Pagination,
) -> Result<Vec<&'s PlayerStatistics>, QueryError> {
    pagination.validate()?;
    for filter in filters {
        filter.validate()?;
    }

    let mut players: Vec<&PlayerStatistics> = store
        .iter()
        .filter(|p| filters.iter().all(|f| f.matches(p, store)))
        .collect();

    debug!("{} of {} players match {} filters", players.len(), store.len(), filters.len());

    if let Some(sort) = sort {
        players.sort_by(|a, b| sort.compare(a, b));
    }

    Ok(players
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.page_size)
        .collect())
}

/// Look a player up by store key, then by canonical identity.
pub fn find_player<'s>(
    store: &'s PlayerStatsStore,
    resolver: &IdentityResolver<'_>,
    name: &str,
) -> Option<&'s PlayerStatistics> {
    store
        .get(name)
        .or_else(|| store.get(resolver.normalize(name)))
        .or_else(|| store.get(&resolver.resolve_canonical(name)))
}

/// Restriction on which of a player's matches count in [`filtered_view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFilter {
    /// Keep matches whose score (from the player's side) is listed
    Scores(Vec<Score>),
    BestOf(BestOf),
    Result(MatchResult),
}

impl MatchFilter {
    fn keeps(&self, m: &PlayerMatch) -> bool {
        match self {
            MatchFilter::Scores(scores) => scores.contains(&m.score),
            MatchFilter::BestOf(best_of) => m.best_of == *best_of,
            MatchFilter::Result(result) => m.result == *result,
        }
    }
}

/// A player's statistics recomputed over a subset of their matches.
///
/// Match counts, game totals, straight and deciding games, format records,
/// streaks and trend are recomputed. Fields that depend on other players or
/// on time buckets keep their full-history values.
pub fn filtered_view(stats: &PlayerStatistics, filters: &[MatchFilter]) -> PlayerStatistics {
    let matches: Vec<PlayerMatch> = stats
        .matches
        .iter()
        .filter(|m| filters.iter().all(|f| f.keeps(m)))
        .cloned()
        .collect();

    let mut view = PlayerStatistics {
        time_based_stats: stats.time_based_stats.clone(),
        head_to_head: stats.head_to_head.clone(),
        ..PlayerStatistics::new(stats.name.as_str())
    };
    view.display_names = stats.display_names.clone();
    view.events_participated = stats.events_participated;
    view.average_days_between_matches = stats.average_days_between_matches;
    view.days_since_last_match = stats.days_since_last_match;
    view.win_rate_after_win = stats.win_rate_after_win;
    view.win_rate_after_loss = stats.win_rate_after_loss;
    view.average_opponent_win_rate = stats.average_opponent_win_rate;
    view.win_rate_against_higher_rated = stats.win_rate_against_higher_rated;
    view.win_rate_against_lower_rated = stats.win_rate_against_lower_rated;
    view.most_common_opponent = stats.most_common_opponent.clone();
    view.win_rate_against_most_common_opponent = stats.win_rate_against_most_common_opponent;

    recount(&mut view, matches);
    view
}

/// Merge statistics of every store entry sharing a canonical identity.
///
/// Counters are summed and rates recomputed; entries with fewer than
/// `min_matches` merged matches are dropped. Sorted by win rate, highest
/// first.
pub fn merge_by_identity(
    store: &PlayerStatsStore,
    resolver: &IdentityResolver<'_>,
    min_matches: u32,
) -> Vec<PlayerStatistics> {
    let mut merged: Vec<PlayerStatistics> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for stats in store.iter() {
        let canonical = resolver.resolve_canonical(&stats.name);
        let slot = *index.entry(canonical.clone()).or_insert_with(|| {
            merged.push(PlayerStatistics::new(canonical));
            merged.len() - 1
        });
        let target = &mut merged[slot];

        for name in &stats.display_names {
            if !target.display_names.contains(name) {
                target.display_names.push(name.clone());
            }
        }
        for window in TimeWindow::ALL {
            merge_rate(target.time_based_stats.get_mut(window), stats.time_based_stats.get(window));
        }
        target.matches.extend(stats.matches.iter().cloned());
    }

    let mut leaderboard: Vec<PlayerStatistics> = merged
        .into_iter()
        .map(|mut player| {
            let mut matches = std::mem::take(&mut player.matches);
            matches.sort_by_key(|m| m.completed_at);
            recount(&mut player, matches);
            player
        })
        .filter(|p| p.matches_played >= min_matches)
        .collect();

    leaderboard.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
    leaderboard
}

fn merge_rate(target: &mut RateStats, source: &RateStats) {
    target.matches_played += source.matches_played;
    target.wins += source.wins;
    target.win_rate = calculate_win_rate(target.wins, target.matches_played);
}

/// Reset and recount everything that follows directly from the match list.
fn recount(stats: &mut PlayerStatistics, matches: Vec<PlayerMatch>) {
    stats.matches_played = 0;
    stats.wins = 0;
    stats.losses = 0;
    stats.total_games_won = 0;
    stats.total_games_lost = 0;
    stats.straight_game_wins = 0;
    stats.straight_game_losses = 0;
    stats.straight_game_matches = 0;
    stats.deciding_game_wins = 0;
    stats.deciding_game_losses = 0;
    stats.deciding_game_matches = 0;
    stats.best_of_3 = RateStats::default();
    stats.best_of_5 = RateStats::default();

    for m in &matches {
        let won = m.result.is_win();
        stats.matches_played += 1;
        if won {
            stats.wins += 1;
        } else {
            stats.losses += 1;
        }
        stats.total_games_won += m.score.won;
        stats.total_games_lost += m.score.lost;

        if m.score.won == 0 || m.score.lost == 0 {
            stats.straight_game_matches += 1;
            if won {
                stats.straight_game_wins += 1;
            } else {
                stats.straight_game_losses += 1;
            }
        }
        if m.is_deciding() {
            stats.deciding_game_matches += 1;
            if won {
                stats.deciding_game_wins += 1;
            } else {
                stats.deciding_game_losses += 1;
            }
        }
        match m.best_of {
            BestOf::Bo3 => stats.best_of_3.record(won),
            BestOf::Bo5 => stats.best_of_5.record(won),
        }
    }

    let results: Vec<MatchResult> = matches.iter().map(|m| m.result).collect();
    let streaks = StreakTracker::from_results(results.iter().copied());
    stats.current_win_streak = streaks.current_win;
    stats.longest_win_streak = streaks.longest_win;
    stats.current_losing_streak = streaks.current_loss;
    stats.longest_losing_streak = streaks.longest_loss;
    stats.performance_trend = PerformanceTrend::from_results(&results);

    stats.matches = matches;
    stats.refresh_rates();
}
