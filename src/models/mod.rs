//! Core data models for bracket statistics.

mod head_to_head;
mod match_record;
mod raw;
mod stats;

pub use head_to_head::*;
pub use match_record::*;
pub use raw::*;
pub use stats::*;
