//! Statistics calculation helpers.
//!
//! Pure functions shared by the aggregators:
//! - Win rates as percentages (0 to 100), zero-safe
//! - Win/loss streak tracking
//! - Averages and day arithmetic on epoch-second timestamps

use chrono::{DateTime, Utc};

use crate::models::MatchResult;

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Win rate as a percentage. Returns 0 when nothing was played.
pub fn calculate_win_rate(wins: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64 * 100.0
    }
}

/// Win rate as a percentage, `None` when nothing was played.
pub fn calculate_optional_rate(wins: u32, total: u32) -> Option<f64> {
    (total > 0).then(|| calculate_win_rate(wins, total))
}

/// Arithmetic mean, 0 for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Whole days elapsed from `from` to `to` (epoch seconds), truncated toward zero.
pub fn days_between(from: i64, to: i64) -> i64 {
    (to - from) / SECONDS_PER_DAY
}

/// Format an epoch-second timestamp as `YYYY-MM-DD` (UTC).
pub fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Single forward scan over results, tracking current and longest runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakTracker {
    pub current_win: u32,
    pub longest_win: u32,
    pub current_loss: u32,
    pub longest_loss: u32,
}

impl StreakTracker {
    pub fn record(&mut self, result: MatchResult) {
        match result {
            MatchResult::Win => {
                self.current_win += 1;
                self.current_loss = 0;
                self.longest_win = self.longest_win.max(self.current_win);
            }
            MatchResult::Loss => {
                self.current_loss += 1;
                self.current_win = 0;
                self.longest_loss = self.longest_loss.max(self.current_loss);
            }
        }
    }

    pub fn from_results(results: impl IntoIterator<Item = MatchResult>) -> Self {
        let mut tracker = Self::default();
        for result in results {
            tracker.record(result);
        }
        tracker
    }
}
