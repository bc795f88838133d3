//! Head-to-head index: every match between two identities, seen from both sides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BestOf, Match, MatchResult, Score};

/// One meeting, recorded from the perspective of the player owning the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadEntry {
    /// Opponent canonical identity
    pub opponent_name: String,
    pub result: MatchResult,
    pub score: Score,
    pub best_of: BestOf,
    pub tournament_name: String,
    pub event_name: String,
    pub event_id: u64,
    pub set_id: u64,
    pub completed_at: i64,
    #[serde(default)]
    pub event_start_at: i64,
}

impl HeadToHeadEntry {
    /// Build the winner's and the loser's entries for one match.
    pub fn pair_from_match(m: &Match, winner: &str, loser: &str) -> (Self, Self) {
        let winner_entry = Self {
            opponent_name: loser.to_string(),
            result: MatchResult::Win,
            score: m.winner_perspective(),
            best_of: m.best_of,
            tournament_name: m.tournament_name.clone(),
            event_name: m.event_name.clone(),
            event_id: m.event_id,
            set_id: m.set_id,
            completed_at: m.completed_at,
            event_start_at: m.event_start_at,
        };
        let loser_entry = winner_entry.mirrored(winner);
        (winner_entry, loser_entry)
    }

    /// The same meeting seen by the opponent, who faced `player`.
    pub fn mirrored(&self, player: &str) -> Self {
        Self {
            opponent_name: player.to_string(),
            result: self.result.inverse(),
            score: self.score.inverted(),
            ..self.clone()
        }
    }
}

/// All meetings of one player, grouped by opponent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerHeadToHead {
    pub name: String,
    pub opponents: BTreeMap<String, Vec<HeadToHeadEntry>>,
}

/// Symmetric index: identity -> opponent identity -> meetings ordered by `completedAt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadToHeadIndex {
    players: BTreeMap<String, PlayerHeadToHead>,
}

impl HeadToHeadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one match under both players. Callers feed matches in chronological order.
    pub fn record(&mut self, m: &Match, winner: &str, loser: &str) {
        let (winner_entry, loser_entry) = HeadToHeadEntry::pair_from_match(m, winner, loser);
        self.push(winner, loser, winner_entry);
        self.push(loser, winner, loser_entry);
    }

    fn push(&mut self, player: &str, opponent: &str, entry: HeadToHeadEntry) {
        self.players
            .entry(player.to_string())
            .or_insert_with(|| PlayerHeadToHead {
                name: player.to_string(),
                opponents: BTreeMap::new(),
            })
            .opponents
            .entry(opponent.to_string())
            .or_default()
            .push(entry);
    }

    pub fn player(&self, name: &str) -> Option<&PlayerHeadToHead> {
        self.players.get(name)
    }

    /// Meetings between two identities from `player`'s side; empty when they never met.
    pub fn entries(&self, player: &str, opponent: &str) -> &[HeadToHeadEntry] {
        self.players
            .get(player)
            .and_then(|p| p.opponents.get(opponent))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerHeadToHead> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
