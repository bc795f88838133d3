//! Head-to-head index construction and per-opponent summaries.

use chrono::{DateTime, Utc};

use crate::calculate::{
    average, calculate_optional_rate, calculate_win_rate, days_between, format_date,
};
use crate::identity::IdentityResolver;
use crate::models::{
    BestOf, HeadToHeadEntry, HeadToHeadIndex, HeadToHeadSummary, Match, MatchResult,
    PerformanceTrend, RecentForm, RecentMatchups,
};

/// Build the symmetric index from chronologically ordered matches.
pub fn build(matches: &[&Match], resolver: &IdentityResolver<'_>) -> HeadToHeadIndex {
    let mut index = HeadToHeadIndex::new();

    for m in matches {
        let winner = resolver.resolve_canonical(&m.winner_name);
        let loser = resolver.resolve_canonical(&m.loser_name);
        index.record(m, &winner, &loser);
    }

    index
}

/// Summarize one player's meetings with `opponent`. `None` when they never met.
pub fn summarize(
    opponent: &str,
    entries: &[HeadToHeadEntry],
    reference: DateTime<Utc>,
) -> Option<HeadToHeadSummary> {
    let last = entries.last()?;

    let total = entries.len() as u32;
    let wins = entries.iter().filter(|e| e.result.is_win()).count() as u32;
    let margins: Vec<f64> = entries.iter().map(|e| e.score.margin() as f64).collect();
    let results: Vec<MatchResult> = entries.iter().map(|e| e.result).collect();

    Some(HeadToHeadSummary {
        opponent_name: opponent.to_string(),
        total_matches_played: total,
        wins,
        losses: total - wins,
        win_rate: calculate_win_rate(wins, total),
        recent_matchups: recent_matchups(entries),
        win_rate_best_of_3: format_win_rate(entries, BestOf::Bo3),
        win_rate_best_of_5: format_win_rate(entries, BestOf::Bo5),
        last_match_date: format_date(last.completed_at),
        last_match_event: last.tournament_name.clone(),
        days_since_last_match: days_between(last.completed_at, reference.timestamp()),
        average_margin: average(&margins),
        performance_trend: PerformanceTrend::from_results(&results),
    })
}

/// Form over the trailing 1, 3, 5 and 10 meetings.
pub fn recent_matchups(entries: &[HeadToHeadEntry]) -> RecentMatchups {
    let [one, three, five, ten] = RecentMatchups::DEPTHS.map(|depth| recent_form(entries, depth));
    RecentMatchups {
        last_1_matches: one,
        last_3_matches: three,
        last_5_matches: five,
        last_10_matches: ten,
    }
}

fn recent_form(entries: &[HeadToHeadEntry], depth: usize) -> RecentForm {
    let recent = &entries[entries.len().saturating_sub(depth)..];

    let played = recent.len() as u32;
    let wins = recent.iter().filter(|e| e.result.is_win()).count() as u32;
    let games_won: u32 = recent.iter().map(|e| e.score.won).sum();
    let games_played: u32 = recent.iter().map(|e| e.score.total_games()).sum();

    RecentForm {
        matches_played: played,
        wins,
        losses: played - wins,
        win_rate: calculate_optional_rate(wins, played),
        game_win_rate: calculate_optional_rate(games_won, games_played),
    }
}

fn format_win_rate(entries: &[HeadToHeadEntry], best_of: BestOf) -> f64 {
    let (wins, total) = entries
        .iter()
        .filter(|e| e.best_of == best_of)
        .fold((0, 0), |(wins, total), e| {
            (wins + u32::from(e.result.is_win()), total + 1)
        });
    calculate_win_rate(wins, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::*;
    use crate::identity::AliasTable;

    fn index_for(matches: &[Match], aliases: &AliasTable) -> HeadToHeadIndex {
        let resolver = IdentityResolver::new(aliases);
        let refs: Vec<&Match> = matches.iter().collect();
        build(&refs, &resolver)
    }

    #[test]
    fn test_build_merges_aliases() {
        let aliases: AliasTable = [("P-One", "P1")].into_iter().collect();
        let mut matches = three_match_scenario();
        matches.push(match_at(4, "Sponsor | P-One", "P2", (2, 1), 1));

        let index = index_for(&matches, &aliases);
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries("P1", "P2").len(), 4);
        assert_eq!(index.entries("P2", "P1").len(), 4);
        assert!(index.player("P-One").is_none());
    }

    #[test]
    fn test_summarize_three_match_scenario() {
        let aliases = AliasTable::new();
        let index = index_for(&three_match_scenario(), &aliases);

        let summary = summarize("P2", index.entries("P1", "P2"), reference()).unwrap();
        assert_eq!(summary.total_matches_played, 3);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.win_rate_best_of_3, 100.0);
        assert_eq!(summary.win_rate_best_of_5, 50.0);
        assert_eq!(summary.days_since_last_match, 5);
        assert_eq!(summary.last_match_event, "Weekly 3");
        assert_eq!(summary.last_match_date, "2025-05-27");
        // (3 - 1 + 2) / 3
        assert!((summary.average_margin - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.performance_trend, PerformanceTrend::Stable);

        let recent = &summary.recent_matchups;
        assert_eq!(recent.last_1_matches.matches_played, 1);
        assert_eq!(recent.last_1_matches.win_rate, Some(100.0));
        assert_eq!(recent.last_10_matches.matches_played, 3);
        // 7 games won of 10
        assert_eq!(recent.last_10_matches.game_win_rate, Some(70.0));
    }

    #[test]
    fn test_summarize_no_meetings() {
        assert!(summarize("Nobody", &[], reference()).is_none());
    }

    #[test]
    fn test_recent_form_empty_rates_are_none() {
        let form = recent_form(&[], 3);
        assert_eq!(form.matches_played, 0);
        assert_eq!(form.win_rate, None);
        assert_eq!(form.game_win_rate, None);
    }
}
