//! Derived statistics models.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BestOf, MatchResult, Score};

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Number of most recent matches used for trend classification.
pub const TREND_WINDOW: usize = 5;

/// Rolling windows for time-bucketed statistics.
///
/// Windows are measured back from the aggregation reference time, not from
/// the time of any match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindow {
    Last6Months,
    Last3Months,
    Last1Month,
    Last10Days,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Last6Months,
        TimeWindow::Last3Months,
        TimeWindow::Last1Month,
        TimeWindow::Last10Days,
    ];

    /// Window length in days.
    pub fn days(&self) -> i64 {
        match self {
            TimeWindow::Last6Months => 183,
            TimeWindow::Last3Months => 91,
            TimeWindow::Last1Month => 30,
            TimeWindow::Last10Days => 10,
        }
    }

    /// Earliest `completed_at` (epoch seconds) inside the window.
    pub fn since(&self, reference: DateTime<Utc>) -> i64 {
        reference.timestamp() - self.days() * SECONDS_PER_DAY
    }

    pub fn contains(&self, completed_at: i64, reference: DateTime<Utc>) -> bool {
        completed_at >= self.since(reference)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Last6Months => write!(f, "Last 6 Months"),
            TimeWindow::Last3Months => write!(f, "Last 3 Months"),
            TimeWindow::Last1Month => write!(f, "Last 1 Month"),
            TimeWindow::Last10Days => write!(f, "Last 10 Days"),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "6m" | "last-6-months" => Ok(TimeWindow::Last6Months),
            "3m" | "last-3-months" => Ok(TimeWindow::Last3Months),
            "1m" | "last-1-month" => Ok(TimeWindow::Last1Month),
            "10d" | "last-10-days" => Ok(TimeWindow::Last10Days),
            other => Err(format!("unknown time window: {}", other)),
        }
    }
}

/// Recent form classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTrend {
    Improving,
    #[default]
    Stable,
    Declining,
}

impl PerformanceTrend {
    /// Classify by wins among the last [`TREND_WINDOW`] results (fewer if unavailable).
    pub fn from_results(results: &[MatchResult]) -> Self {
        let start = results.len().saturating_sub(TREND_WINDOW);
        let wins = results[start..].iter().filter(|r| r.is_win()).count();
        Self::from_recent_wins(wins)
    }

    pub fn from_recent_wins(wins: usize) -> Self {
        if wins >= 4 {
            PerformanceTrend::Improving
        } else if wins <= 1 {
            PerformanceTrend::Declining
        } else {
            PerformanceTrend::Stable
        }
    }
}

impl fmt::Display for PerformanceTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTrend::Improving => write!(f, "improving"),
            PerformanceTrend::Stable => write!(f, "stable"),
            PerformanceTrend::Declining => write!(f, "declining"),
        }
    }
}

/// Match count, wins, and win rate (0-100) over some subset of matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateStats {
    pub matches_played: u32,
    pub wins: u32,
    pub win_rate: f64,
}

impl RateStats {
    pub fn record(&mut self, won: bool) {
        self.matches_played += 1;
        if won {
            self.wins += 1;
        }
        self.win_rate = crate::calculate::calculate_win_rate(self.wins, self.matches_played);
    }
}

/// Time-bucketed statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBasedStats {
    pub last_6_months: RateStats,
    pub last_3_months: RateStats,
    pub last_1_month: RateStats,
    pub last_10_days: RateStats,
}

impl TimeBasedStats {
    pub fn get(&self, window: TimeWindow) -> &RateStats {
        match window {
            TimeWindow::Last6Months => &self.last_6_months,
            TimeWindow::Last3Months => &self.last_3_months,
            TimeWindow::Last1Month => &self.last_1_month,
            TimeWindow::Last10Days => &self.last_10_days,
        }
    }

    pub fn get_mut(&mut self, window: TimeWindow) -> &mut RateStats {
        match window {
            TimeWindow::Last6Months => &mut self.last_6_months,
            TimeWindow::Last3Months => &mut self.last_3_months,
            TimeWindow::Last1Month => &mut self.last_1_month,
            TimeWindow::Last10Days => &mut self.last_10_days,
        }
    }

    /// Count a match into every window that contains it.
    pub fn record(&mut self, completed_at: i64, reference: DateTime<Utc>, won: bool) {
        for window in TimeWindow::ALL {
            if window.contains(completed_at, reference) {
                self.get_mut(window).record(won);
            }
        }
    }
}

/// Form over the last N meetings with one opponent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentForm {
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    /// `None` when there were no meetings
    pub win_rate: Option<f64>,
    pub game_win_rate: Option<f64>,
}

/// Recent form at the standard depths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentMatchups {
    pub last_1_matches: RecentForm,
    pub last_3_matches: RecentForm,
    pub last_5_matches: RecentForm,
    pub last_10_matches: RecentForm,
}

impl RecentMatchups {
    /// Depths reported for recent form.
    pub const DEPTHS: [usize; 4] = [1, 3, 5, 10];
}

/// Summary of a player's record against one opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadSummary {
    pub opponent_name: String,
    pub total_matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub recent_matchups: RecentMatchups,
    pub win_rate_best_of_3: f64,
    pub win_rate_best_of_5: f64,
    /// `YYYY-MM-DD` (UTC) of the latest meeting
    pub last_match_date: String,
    pub last_match_event: String,
    pub days_since_last_match: i64,
    /// Mean of (games won - games lost) per meeting
    pub average_margin: f64,
    pub performance_trend: PerformanceTrend,
}

/// One match in a player's own history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMatch {
    pub opponent_name: String,
    pub result: MatchResult,
    pub score: Score,
    pub best_of: BestOf,
    pub event_id: u64,
    pub event_start_at: i64,
    pub completed_at: i64,
}

impl PlayerMatch {
    pub fn is_straight_win(&self) -> bool {
        self.result.is_win() && self.score.lost == 0
    }

    pub fn is_deciding(&self) -> bool {
        self.score.total_games() == self.best_of.max_games()
    }
}

/// Cumulative statistics for one player identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatistics {
    /// Store key: canonical identity or raw display name
    pub name: String,

    /// Raw display names seen for this player, in order of first appearance
    pub display_names: Vec<String>,

    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    /// Win rate (0 to 100)
    pub win_rate: f64,

    pub total_games_won: u32,
    pub total_games_lost: u32,
    pub total_games_played: u32,
    pub game_win_rate: f64,
    pub average_games_per_match: f64,

    pub straight_game_wins: u32,
    pub straight_game_losses: u32,
    pub straight_game_matches: u32,
    pub straight_game_win_rate: f64,

    pub deciding_game_wins: u32,
    pub deciding_game_losses: u32,
    pub deciding_game_matches: u32,
    pub deciding_game_win_rate: f64,

    pub best_of_3: RateStats,
    pub best_of_5: RateStats,

    pub time_based_stats: TimeBasedStats,

    pub current_win_streak: u32,
    pub longest_win_streak: u32,
    pub current_losing_streak: u32,
    pub longest_losing_streak: u32,

    pub events_participated: u32,
    pub average_days_between_matches: f64,
    /// `None` when the player has no matches
    pub days_since_last_match: Option<i64>,

    pub win_rate_after_win: f64,
    pub win_rate_after_loss: f64,

    pub average_opponent_win_rate: f64,
    pub win_rate_against_higher_rated: f64,
    pub win_rate_against_lower_rated: f64,
    pub most_common_opponent: Option<String>,
    pub win_rate_against_most_common_opponent: f64,

    pub performance_trend: PerformanceTrend,

    /// Per-opponent summaries keyed by opponent canonical identity
    pub head_to_head: BTreeMap<String, HeadToHeadSummary>,

    /// Chronological match history
    pub matches: Vec<PlayerMatch>,
}

impl PlayerStatistics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Format-specific record.
    pub fn format_stats(&self, best_of: BestOf) -> &RateStats {
        match best_of {
            BestOf::Bo3 => &self.best_of_3,
            BestOf::Bo5 => &self.best_of_5,
        }
    }

    /// Whether any match completed within `[since, until]` (inclusive, `None` = open).
    pub fn played_between(&self, since: i64, until: Option<i64>) -> bool {
        self.matches
            .iter()
            .any(|m| m.completed_at >= since && until.map_or(true, |u| m.completed_at <= u))
    }

    /// Recompute every rate from the counters.
    pub fn refresh_rates(&mut self) {
        use crate::calculate::calculate_win_rate;

        self.win_rate = calculate_win_rate(self.wins, self.matches_played);
        self.total_games_played = self.total_games_won + self.total_games_lost;
        self.game_win_rate = calculate_win_rate(self.total_games_won, self.total_games_played);
        self.average_games_per_match = if self.matches_played > 0 {
            self.total_games_played as f64 / self.matches_played as f64
        } else {
            0.0
        };
        self.straight_game_win_rate =
            calculate_win_rate(self.straight_game_wins, self.straight_game_matches);
        self.deciding_game_win_rate =
            calculate_win_rate(self.deciding_game_wins, self.deciding_game_matches);
    }
}

/// Snapshot shape used when loading a persisted store.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerStatsSnapshot {
    reference_time: DateTime<Utc>,
    players: Vec<PlayerStatistics>,
}

/// All player statistics from one aggregation run, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PlayerStatsSnapshot")]
pub struct PlayerStatsStore {
    reference_time: DateTime<Utc>,
    players: Vec<PlayerStatistics>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl From<PlayerStatsSnapshot> for PlayerStatsStore {
    fn from(snapshot: PlayerStatsSnapshot) -> Self {
        let mut store = Self::new(snapshot.reference_time);
        for stats in snapshot.players {
            store.insert(stats);
        }
        store
    }
}

impl PlayerStatsStore {
    pub fn new(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time,
            players: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Time the time buckets were computed against.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Insert or replace statistics for `stats.name`.
    pub fn insert(&mut self, stats: PlayerStatistics) {
        match self.index.get(&stats.name) {
            Some(&i) => self.players[i] = stats,
            None => {
                self.index.insert(stats.name.clone(), self.players.len());
                self.players.push(stats);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PlayerStatistics> {
        self.index.get(name).map(|&i| &self.players[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerStatistics> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
