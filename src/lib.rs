//! # Bracket Stats
//!
//! Player and head-to-head statistics built from tournament bracket sets.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (raw events, matches, player stats, head-to-head)
//! - **normalize**: Raw bracket sets to validated match records
//! - **identity**: Name normalization and alias resolution
//! - **aggregate**: Per-player and per-pair statistics from the match log
//! - **query**: Filtering, sorting and merging of derived statistics
//! - **storage**: Filesystem data lake operations (JSON, JSONL)
//! - **calculate**: Rate, streak and date helpers
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod calculate;
pub mod config;
pub mod identity;
pub mod models;
pub mod normalize;
pub mod query;
pub mod storage;

pub use models::*;
