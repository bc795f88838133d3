//! Player aggregation: folds the ordered match log into per-player statistics.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::head_to_head::summarize;
use super::AggregateOptions;
use crate::calculate::{average, calculate_win_rate, days_between, StreakTracker};
use crate::identity::IdentityResolver;
use crate::models::{
    BestOf, HeadToHeadIndex, Match, MatchResult, PerformanceTrend, PlayerMatch, PlayerStatistics,
    PlayerStatsStore,
};

/// Aggregate chronologically ordered, validated matches.
///
/// The head-to-head index must be built from the same matches first.
pub fn aggregate(
    matches: &[&Match],
    resolver: &IdentityResolver<'_>,
    head_to_head: &HeadToHeadIndex,
    options: &AggregateOptions,
) -> PlayerStatsStore {
    let reference = options.reference_time;
    let mut players: Vec<PlayerStatistics> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for m in matches {
        let winner_key = options.key_mode.key(resolver, &m.winner_name);
        let loser_key = options.key_mode.key(resolver, &m.loser_name);

        for (key, raw_name, opponent, won) in [
            (&winner_key, &m.winner_name, &loser_key, true),
            (&loser_key, &m.loser_name, &winner_key, false),
        ] {
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                players.push(PlayerStatistics::new(key.as_str()));
                players.len() - 1
            });
            record_match(&mut players[slot], m, raw_name, opponent, won, reference);
        }
    }

    for stats in &mut players {
        finalize_own(stats, reference);
    }

    let win_rates: HashMap<String, f64> = players
        .iter()
        .map(|p| (p.name.clone(), p.win_rate))
        .collect();

    let mut store = PlayerStatsStore::new(reference);
    for mut stats in players {
        finalize_opponents(&mut stats, &win_rates, resolver);
        attach_head_to_head(&mut stats, resolver, head_to_head, reference);
        debug!(
            "{}: {} matches, {:.1}% win rate",
            stats.name, stats.matches_played, stats.win_rate
        );
        store.insert(stats);
    }

    store
}

/// Count one match into a player's accumulator.
fn record_match(
    stats: &mut PlayerStatistics,
    m: &Match,
    raw_name: &str,
    opponent: &str,
    won: bool,
    reference: DateTime<Utc>,
) {
    if !stats.display_names.iter().any(|n| n == raw_name) {
        stats.display_names.push(raw_name.to_string());
    }

    let score = if won {
        m.winner_perspective()
    } else {
        m.winner_perspective().inverted()
    };

    stats.matches_played += 1;
    if won {
        stats.wins += 1;
    } else {
        stats.losses += 1;
    }
    stats.total_games_won += score.won;
    stats.total_games_lost += score.lost;

    if m.is_straight() {
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
    stats.time_based_stats.record(m.completed_at, reference, won);

    stats.matches.push(PlayerMatch {
        opponent_name: opponent.to_string(),
        result: MatchResult::from_won(won),
        score,
        best_of: m.best_of,
        event_id: m.event_id,
        event_start_at: m.event_start_at,
        completed_at: m.completed_at,
    });
}

/// Fields derived from the player's own history alone.
fn finalize_own(stats: &mut PlayerStatistics, reference: DateTime<Utc>) {
    stats.refresh_rates();

    let results: Vec<MatchResult> = stats.matches.iter().map(|m| m.result).collect();

    let streaks = StreakTracker::from_results(results.iter().copied());
    stats.current_win_streak = streaks.current_win;
    stats.longest_win_streak = streaks.longest_win;
    stats.current_losing_streak = streaks.current_loss;
    stats.longest_losing_streak = streaks.longest_loss;

    stats.performance_trend = PerformanceTrend::from_results(&results);

    stats.events_participated = stats
        .matches
        .iter()
        .map(|m| m.event_id)
        .collect::<BTreeSet<_>>()
        .len() as u32;

    let gaps: Vec<f64> = stats
        .matches
        .windows(2)
        .map(|pair| days_between(pair[0].completed_at, pair[1].completed_at) as f64)
        .collect();
    stats.average_days_between_matches = average(&gaps);
    stats.days_since_last_match = stats
        .matches
        .last()
        .map(|m| days_between(m.completed_at, reference.timestamp()));

    let (mut after_win, mut after_loss) = ((0, 0), (0, 0));
    for pair in results.windows(2) {
        let bucket = if pair[0].is_win() {
            &mut after_win
        } else {
            &mut after_loss
        };
        bucket.0 += u32::from(pair[1].is_win());
        bucket.1 += 1;
    }
    stats.win_rate_after_win = calculate_win_rate(after_win.0, after_win.1);
    stats.win_rate_after_loss = calculate_win_rate(after_loss.0, after_loss.1);
}

/// Fields that need every player's overall win rate.
///
/// An opponent counts as higher rated when their win rate is strictly above
/// the player's own.
fn finalize_opponents(
    stats: &mut PlayerStatistics,
    win_rates: &HashMap<String, f64>,
    resolver: &IdentityResolver<'_>,
) {
    let mut opponent_rates = Vec::with_capacity(stats.matches.len());
    let (mut higher, mut lower) = ((0, 0), (0, 0));
    let mut counts: Vec<(String, u32)> = Vec::new();

    for m in &stats.matches {
        if let Some(&rate) = win_rates.get(&m.opponent_name) {
            opponent_rates.push(rate);
            let bucket = if rate > stats.win_rate {
                &mut higher
            } else {
                &mut lower
            };
            bucket.0 += u32::from(m.result.is_win());
            bucket.1 += 1;
        }

        let canonical = resolver.resolve_canonical(&m.opponent_name);
        match counts.iter_mut().find(|(name, _)| *name == canonical) {
            Some((_, count)) => *count += 1,
            None => counts.push((canonical, 1)),
        }
    }

    stats.average_opponent_win_rate = average(&opponent_rates);
    stats.win_rate_against_higher_rated = calculate_win_rate(higher.0, higher.1);
    stats.win_rate_against_lower_rated = calculate_win_rate(lower.0, lower.1);

    // Ties go to the opponent met first.
    let most_common = counts
        .into_iter()
        .fold(None::<(String, u32)>, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((name, count)),
        })
        .map(|(name, _)| name);

    if let Some(opponent) = &most_common {
        let (wins, total) = stats
            .matches
            .iter()
            .filter(|m| resolver.resolve_canonical(&m.opponent_name) == *opponent)
            .fold((0, 0), |(wins, total), m| {
                (wins + u32::from(m.result.is_win()), total + 1)
            });
        stats.win_rate_against_most_common_opponent = calculate_win_rate(wins, total);
    }
    stats.most_common_opponent = most_common;
}

/// Per-opponent summaries, read from the canonical head-to-head index.
fn attach_head_to_head(
    stats: &mut PlayerStatistics,
    resolver: &IdentityResolver<'_>,
    head_to_head: &HeadToHeadIndex,
    reference: DateTime<Utc>,
) {
    let own = resolver.resolve_canonical(&stats.name);
    let Some(record) = head_to_head.player(&own) else {
        return;
    };

    stats.head_to_head = record
        .opponents
        .iter()
        .filter_map(|(opponent, entries)| {
            summarize(opponent, entries, reference).map(|s| (opponent.clone(), s))
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::aggregate::test_support::*;
    use crate::aggregate::{prepare, KeyMode};
    use crate::identity::AliasTable;

    fn aggregate_all(matches: &[Match], aliases: &AliasTable, mode: KeyMode) -> PlayerStatsStore {
        let resolver = IdentityResolver::new(aliases);
        let ordered = prepare(matches, &resolver);
        let index = crate::aggregate::head_to_head::build(&ordered, &resolver);
        let options = AggregateOptions::new(reference()).with_key_mode(mode);
        aggregate(&ordered, &resolver, &index, &options)
    }

    #[test]
    fn test_three_match_scenario() {
        let store = aggregate_all(&three_match_scenario(), &AliasTable::new(), KeyMode::Canonical);
        let p1 = store.get("P1").unwrap();

        assert_eq!(p1.matches_played, 3);
        assert_eq!(p1.wins, 2);
        assert_eq!(p1.losses, 1);
        assert!((p1.win_rate - 66.67).abs() < 0.01);
        assert_eq!(p1.current_win_streak, 1);
        assert_eq!(p1.longest_win_streak, 1);
        assert_eq!(p1.current_losing_streak, 0);
        assert_eq!(p1.straight_game_wins, 2);
        assert_eq!(p1.straight_game_losses, 0);
        assert_eq!(p1.deciding_game_wins, 0);
        assert_eq!(p1.deciding_game_losses, 1);
        assert_eq!(p1.total_games_won, 7);
        assert_eq!(p1.total_games_lost, 3);
        assert_eq!(p1.best_of_5.matches_played, 2);
        assert_eq!(p1.best_of_3.wins, 1);
        assert_eq!(p1.events_participated, 3);
        assert_eq!(p1.days_since_last_match, Some(5));
        assert_eq!(p1.average_days_between_matches, 12.5);
        assert_eq!(p1.win_rate_after_win, 0.0);
        assert_eq!(p1.win_rate_after_loss, 100.0);
        assert_eq!(p1.most_common_opponent.as_deref(), Some("P2"));
        assert_eq!(p1.head_to_head["P2"].total_matches_played, 3);

        let p2 = store.get("P2").unwrap();
        assert_eq!(p2.straight_game_losses, 2);
        assert_eq!(p2.deciding_game_wins, 1);
        assert_eq!(p2.longest_losing_streak, 1);
    }

    #[test]
    fn test_time_buckets_are_relative_to_reference() {
        let store = aggregate_all(&three_match_scenario(), &AliasTable::new(), KeyMode::Canonical);
        let buckets = &store.get("P1").unwrap().time_based_stats;

        assert_eq!(buckets.last_6_months.matches_played, 3);
        assert_eq!(buckets.last_3_months.matches_played, 3);
        assert_eq!(buckets.last_1_month.matches_played, 3);
        assert_eq!(buckets.last_10_days.matches_played, 1);
        assert_eq!(buckets.last_10_days.win_rate, 100.0);
    }

    #[test]
    fn test_single_win_history() {
        let matches = vec![match_at(1, "Solo", "Other", (2, 1), 1)];
        let store = aggregate_all(&matches, &AliasTable::new(), KeyMode::Canonical);

        let solo = store.get("Solo").unwrap();
        assert_eq!(solo.current_win_streak, 1);
        assert_eq!(solo.longest_win_streak, 1);
        assert_eq!(solo.current_losing_streak, 0);
        assert_eq!(solo.deciding_game_wins, 1);
        assert_eq!(solo.average_days_between_matches, 0.0);
    }

    #[test]
    fn test_opponent_ratings() {
        // Ace 2-0, Mid 1-1, Low 0-2 overall
        let matches = vec![
            match_at(1, "Ace", "Mid", (2, 0), 4),
            match_at(2, "Mid", "Low", (2, 0), 3),
            match_at(3, "Ace", "Low", (2, 1), 2),
        ];
        let store = aggregate_all(&matches, &AliasTable::new(), KeyMode::Canonical);

        let mid = store.get("Mid").unwrap();
        assert_eq!(mid.win_rate, 50.0);
        assert_eq!(mid.win_rate_against_higher_rated, 0.0);
        assert_eq!(mid.win_rate_against_lower_rated, 100.0);
        assert_eq!(mid.average_opponent_win_rate, 50.0);
        // Ace was met first
        assert_eq!(mid.most_common_opponent.as_deref(), Some("Ace"));
        assert_eq!(mid.win_rate_against_most_common_opponent, 0.0);
    }

    #[test]
    fn test_raw_mode_display_names_and_summaries() {
        let aliases: AliasTable = [("Johnny", "John")].into_iter().collect();
        let matches = vec![
            match_at(1, "Johnny", "Bob", (2, 0), 3),
            match_at(2, "Team | John", "Bob", (2, 1), 2),
        ];

        let store = aggregate_all(&matches, &aliases, KeyMode::Raw);
        let johnny = store.get("Johnny").unwrap();
        assert_eq!(johnny.matches_played, 1);
        assert_eq!(johnny.display_names, vec!["Johnny".to_string()]);
        // Summaries come from the canonical index.
        assert_eq!(johnny.head_to_head["Bob"].total_matches_played, 2);

        let canonical = aggregate_all(&matches, &aliases, KeyMode::Canonical);
        assert_eq!(
            canonical.get("John").unwrap().display_names,
            vec!["Johnny".to_string(), "Team | John".to_string()]
        );
    }
}
