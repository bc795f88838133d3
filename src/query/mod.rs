//! Read-only queries over aggregated statistics.
//!
//! Every query validates its arguments before touching the store and
//! returns [`QueryError::InvalidArgument`] for values outside their domain.
//! A player or pair with no data is an empty result, never an error.

pub mod head_to_head;
pub mod players;

use thiserror::Error;

pub use head_to_head::{query_head_to_head, EventRanking, HeadToHeadFilter};
pub use players::{
    filtered_view, find_player, merge_by_identity, query_players, Bounds, MatchFilter,
    Pagination, PlayerFilter, PlayerSort, SortField, SortOrder, TimePeriod, DEFAULT_LIMIT,
};

/// Query errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidArgument(message.into())
    }
}
