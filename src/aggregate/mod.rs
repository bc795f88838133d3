//! Full-batch aggregation.
//!
//! Every run rebuilds both stores from the complete match collection:
//! 1. Drop malformed matches and self-matches (logged, never fatal)
//! 2. Stable-sort the rest by `completedAt`
//! 3. Build the head-to-head index
//! 4. Fold per-player statistics, reading pairwise summaries from the index

pub mod head_to_head;
pub mod player;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::identity::{AliasTable, IdentityResolver};
use crate::models::{HeadToHeadIndex, Match, PlayerStatsStore};

/// How player statistics are keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyMode {
    /// One entry per canonical identity
    #[default]
    Canonical,
    /// One entry per raw display name, aliases kept apart
    Raw,
}

impl KeyMode {
    /// Store key for a raw display name.
    pub fn key(&self, resolver: &IdentityResolver<'_>, raw_name: &str) -> String {
        match self {
            KeyMode::Canonical => resolver.resolve_canonical(raw_name),
            KeyMode::Raw => raw_name.to_string(),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Canonical => write!(f, "canonical"),
            KeyMode::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canonical" => Ok(KeyMode::Canonical),
            "raw" => Ok(KeyMode::Raw),
            other => Err(format!("unknown key mode: {}", other)),
        }
    }
}

/// Parameters of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Time buckets and "days since" values are measured back from here
    pub reference_time: DateTime<Utc>,
    pub key_mode: KeyMode,
}

impl AggregateOptions {
    pub fn new(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time,
            key_mode: KeyMode::default(),
        }
    }

    pub fn with_key_mode(mut self, key_mode: KeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }
}

/// Both derived stores from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub players: PlayerStatsStore,
    pub head_to_head: HeadToHeadIndex,
}

/// Aggregate a match collection against an alias table.
pub fn run(matches: &[Match], aliases: &AliasTable, options: &AggregateOptions) -> Aggregation {
    let resolver = IdentityResolver::new(aliases);
    let ordered = prepare(matches, &resolver);

    let head_to_head = head_to_head::build(&ordered, &resolver);
    let players = player::aggregate(&ordered, &resolver, &head_to_head, options);

    info!(
        "Aggregated {} of {} matches into {} players ({} keyed)",
        ordered.len(),
        matches.len(),
        players.len(),
        options.key_mode
    );

    Aggregation {
        players,
        head_to_head,
    }
}

/// Valid matches in chronological order. Ties keep their input order.
pub fn prepare<'m>(matches: &'m [Match], resolver: &IdentityResolver<'_>) -> Vec<&'m Match> {
    let mut ordered: Vec<&Match> = matches
        .iter()
        .filter(|m| {
            if let Err(reason) = m.validate() {
                warn!("Skipping malformed match: {}", reason);
                return false;
            }
            // The head-to-head index is canonical in every key mode.
            if resolver.same_identity(&m.winner_name, &m.loser_name) {
                warn!(
                    "Skipping set {}: '{}' and '{}' resolve to the same player",
                    m.set_id, m.winner_name, m.loser_name
                );
                return false;
            }
            true
        })
        .collect();

    ordered.sort_by_key(|m| m.completed_at);
    ordered
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::TimeZone;

    use super::*;
    use crate::models::BestOf;

    pub fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    /// A match completed `days_ago` days before [`reference`].
    pub fn match_at(
        set_id: u64,
        winner: &str,
        loser: &str,
        score: (u32, u32),
        days_ago: i64,
    ) -> Match {
        Match {
            set_id,
            tournament_name: format!("Weekly {}", set_id),
            event_name: "Singles".to_string(),
            event_id: 100 + set_id,
            event_start_at: reference().timestamp() - days_ago * 86400 - 3600,
            completed_at: reference().timestamp() - days_ago * 86400,
            winner_id: 1,
            winner_name: winner.to_string(),
            loser_id: 2,
            loser_name: loser.to_string(),
            winner_score: score.0,
            loser_score: score.1,
            best_of: BestOf::from_winner_score(score.0),
        }
    }

    /// P1 beats P2 3-0, P2 beats P1 3-2, P1 beats P2 2-0.
    pub fn three_match_scenario() -> Vec<Match> {
        vec![
            match_at(1, "P1", "P2", (3, 0), 30),
            match_at(2, "P2", "P1", (3, 2), 20),
            match_at(3, "P1", "P2", (2, 0), 5),
        ]
    }
}
