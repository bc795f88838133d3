//! Match model: one completed 1v1 set between two entrants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Match format, derived from the winning game count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BestOf {
    #[serde(rename = "Best of 3")]
    Bo3,
    #[serde(rename = "Best of 5")]
    Bo5,
}

impl BestOf {
    /// Classify a set by the winner's game count.
    ///
    /// Three or more game wins can only happen in a best-of-5.
    pub fn from_winner_score(winner_score: u32) -> Self {
        if winner_score >= 3 {
            BestOf::Bo5
        } else {
            BestOf::Bo3
        }
    }

    /// Maximum number of games a set of this format can last.
    pub fn max_games(&self) -> u32 {
        match self {
            BestOf::Bo3 => 3,
            BestOf::Bo5 => 5,
        }
    }

    /// Games a player must win to take a set of this format.
    pub fn games_to_win(&self) -> u32 {
        match self {
            BestOf::Bo3 => 2,
            BestOf::Bo5 => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BestOf::Bo3 => "Best of 3",
            BestOf::Bo5 => "Best of 5",
        }
    }
}

impl fmt::Display for BestOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for BestOf {
    type Err = String;

    /// Accepts the serialized label ("Best of 3") or the short form ("bo3", "3").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best of 3" | "bo3" | "3" => Ok(BestOf::Bo3),
            "best of 5" | "bo5" | "5" => Ok(BestOf::Bo5),
            other => Err(format!("unknown match format: {}", other)),
        }
    }
}

/// Outcome of a match from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Loss,
}

impl MatchResult {
    pub fn from_won(won: bool) -> Self {
        if won {
            MatchResult::Win
        } else {
            MatchResult::Loss
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, MatchResult::Win)
    }

    /// The same match seen from the other side.
    pub fn inverse(&self) -> Self {
        match self {
            MatchResult::Win => MatchResult::Loss,
            MatchResult::Loss => MatchResult::Win,
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Win => write!(f, "win"),
            MatchResult::Loss => write!(f, "loss"),
        }
    }
}

impl FromStr for MatchResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" | "w" => Ok(MatchResult::Win),
            "loss" | "l" => Ok(MatchResult::Loss),
            other => Err(format!("unknown result: {}", other)),
        }
    }
}

/// Game score of a match from one side, serialized as `"<for>-<against>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Score {
    pub won: u32,
    pub lost: u32,
}

impl Score {
    pub fn new(won: u32, lost: u32) -> Self {
        Self { won, lost }
    }

    /// The same score seen from the opponent's side.
    pub fn inverted(&self) -> Self {
        Self {
            won: self.lost,
            lost: self.won,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.won.saturating_add(self.lost)
    }

    /// Games won minus games lost.
    pub fn margin(&self) -> i64 {
        self.won as i64 - self.lost as i64
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.won, self.lost)
    }
}

impl FromStr for Score {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (won, lost) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid score: {}", s))?;
        let won = won
            .trim()
            .parse()
            .map_err(|_| format!("invalid score: {}", s))?;
        let lost = lost
            .trim()
            .parse()
            .map_err(|_| format!("invalid score: {}", s))?;
        Ok(Self { won, lost })
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A completed set between two entrants. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Unique set identifier
    pub set_id: u64,

    pub tournament_name: String,

    pub event_name: String,

    pub event_id: u64,

    /// Event start (epoch seconds)
    #[serde(default)]
    pub event_start_at: i64,

    /// Set completion (epoch seconds, 0 when unknown)
    #[serde(default)]
    pub completed_at: i64,

    pub winner_id: u64,

    /// Raw display name, not normalized
    pub winner_name: String,

    pub loser_id: u64,

    /// Raw display name, not normalized
    pub loser_name: String,

    pub winner_score: u32,

    pub loser_score: u32,

    pub best_of: BestOf,
}

impl Match {
    /// Total games played in the set.
    pub fn total_games(&self) -> u32 {
        self.winner_score.saturating_add(self.loser_score)
    }

    /// Whether the set went the full distance for its format.
    pub fn is_deciding(&self) -> bool {
        self.total_games() == self.best_of.max_games()
    }

    /// Whether the loser failed to take a single game.
    pub fn is_straight(&self) -> bool {
        self.loser_score == 0
    }

    /// Winner's score, as seen by the winner.
    pub fn winner_perspective(&self) -> Score {
        Score::new(self.winner_score, self.loser_score)
    }

    /// Check the structural invariants a normalized match must hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.winner_name.trim().is_empty() || self.loser_name.trim().is_empty() {
            return Err(format!("set {} has an empty player name", self.set_id));
        }
        if self.winner_score <= self.loser_score {
            return Err(format!(
                "set {} has winner score {} not above loser score {}",
                self.set_id, self.winner_score, self.loser_score
            ));
        }
        if self.winner_score > BestOf::Bo5.games_to_win() {
            return Err(format!(
                "set {} has winner score {}, more than any supported format allows",
                self.set_id, self.winner_score
            ));
        }
        if self.best_of != BestOf::from_winner_score(self.winner_score) {
            return Err(format!(
                "set {} is labelled {} but the winner took {} games",
                self.set_id, self.best_of, self.winner_score
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match {
            set_id: 1001,
            tournament_name: "Weekly 12".to_string(),
            event_name: "Singles".to_string(),
            event_id: 55,
            event_start_at: 1_700_000_000,
            completed_at: 1_700_003_600,
            winner_id: 1,
            winner_name: "TAG | Alice".to_string(),
            loser_id: 2,
            loser_name: "Bob".to_string(),
            winner_score: 3,
            loser_score: 1,
            best_of: BestOf::Bo5,
        }
    }

    #[test]
    fn test_best_of_from_winner_score() {
        assert_eq!(BestOf::from_winner_score(2), BestOf::Bo3);
        assert_eq!(BestOf::from_winner_score(3), BestOf::Bo5);
        assert_eq!(BestOf::from_winner_score(0), BestOf::Bo3);
    }

    #[test]
    fn test_best_of_serialization() {
        assert_eq!(serde_json::to_string(&BestOf::Bo3).unwrap(), "\"Best of 3\"");
        assert_eq!(serde_json::to_string(&BestOf::Bo5).unwrap(), "\"Best of 5\"");
        let parsed: BestOf = serde_json::from_str("\"Best of 5\"").unwrap();
        assert_eq!(parsed, BestOf::Bo5);
    }

    #[test]
    fn test_best_of_from_str() {
        assert_eq!("bo3".parse::<BestOf>().unwrap(), BestOf::Bo3);
        assert_eq!("Best of 5".parse::<BestOf>().unwrap(), BestOf::Bo5);
        assert!("bo7".parse::<BestOf>().is_err());
    }

    #[test]
    fn test_score_inverted_and_display() {
        let score = Score::new(3, 1);
        assert_eq!(score.to_string(), "3-1");
        assert_eq!(score.inverted().to_string(), "1-3");
        assert_eq!(score.margin(), 2);
        assert_eq!(score.inverted().margin(), -2);
    }

    #[test]
    fn test_score_serializes_as_string() {
        let json = serde_json::to_string(&Score::new(2, 0)).unwrap();
        assert_eq!(json, "\"2-0\"");
        let parsed: Score = serde_json::from_str("\"1-2\"").unwrap();
        assert_eq!(parsed, Score::new(1, 2));
        assert!(serde_json::from_str::<Score>("\"three-one\"").is_err());
    }

    #[test]
    fn test_match_uses_camel_case_fields() {
        let json = serde_json::to_value(sample_match()).unwrap();
        assert_eq!(json["setId"], 1001);
        assert_eq!(json["winnerName"], "TAG | Alice");
        assert_eq!(json["bestOf"], "Best of 5");
        assert_eq!(json["completedAt"], 1_700_003_600);
    }

    #[test]
    fn test_match_classification() {
        let mut m = sample_match();
        assert!(!m.is_deciding());
        assert!(!m.is_straight());

        m.winner_score = 3;
        m.loser_score = 2;
        assert!(m.is_deciding());

        m.best_of = BestOf::Bo3;
        m.winner_score = 2;
        m.loser_score = 0;
        assert!(m.is_straight());
        assert!(!m.is_deciding());
    }

    #[test]
    fn test_match_validate() {
        assert!(sample_match().validate().is_ok());

        let mut tied = sample_match();
        tied.loser_score = 3;
        assert!(tied.validate().is_err());

        let mut unnamed = sample_match();
        unnamed.loser_name = "  ".to_string();
        assert!(unnamed.validate().is_err());

        let mut mislabelled = sample_match();
        mislabelled.best_of = BestOf::Bo3;
        assert!(mislabelled.validate().is_err());
    }

    #[test]
    fn test_match_validate_rejects_out_of_range_scores() {
        let mut huge = sample_match();
        huge.winner_score = u32::MAX;
        huge.loser_score = 1;
        assert!(huge.validate().is_err());
        assert_eq!(huge.total_games(), u32::MAX);
        assert!(!huge.is_deciding());

        let mut four = sample_match();
        four.winner_score = 4;
        four.loser_score = 0;
        assert!(four.validate().is_err());

        assert_eq!(Score::new(u32::MAX, 2).total_games(), u32::MAX);
    }

    #[test]
    fn test_completed_at_defaults_to_zero() {
        let json = r#"{"setId":1,"tournamentName":"T","eventName":"E","eventId":2,
            "winnerId":3,"winnerName":"A","loserId":4,"loserName":"B",
            "winnerScore":2,"loserScore":1,"bestOf":"Best of 3"}"#;
        let m: Match = serde_json::from_str(json).unwrap();
        assert_eq!(m.completed_at, 0);
        assert_eq!(m.event_start_at, 0);
    }
}
