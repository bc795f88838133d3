//! Filesystem persistence.
//!
//! Layout under the data directory:
//! - `raw/events.json`: fetched events keyed by event key
//! - `normalized/matches.jsonl`: normalized match log
//! - `derived/player_stats.json`, `derived/head_to_head.json`: aggregation output
//! - `aliases.json` (or `.toml`): alias -> canonical name
//!
//! Every read loads the whole file and every write goes through a flushed
//! `BufWriter`; files are closed when the handle drops, on success or error.

pub mod jsonl;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::Aggregation;
use crate::identity::AliasTable;
use crate::models::{HeadToHeadIndex, Match, PlayerStatsStore, RawEventMap};
use jsonl::{is_jsonl, JsonlReader, JsonlWriter};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.data_dir.join("normalized")
    }

    pub fn derived_dir(&self) -> PathBuf {
        self.data_dir.join("derived")
    }

    pub fn raw_events_path(&self) -> PathBuf {
        self.raw_dir().join("events.json")
    }

    pub fn matches_path(&self) -> PathBuf {
        self.normalized_dir().join("matches.jsonl")
    }

    pub fn player_stats_path(&self) -> PathBuf {
        self.derived_dir().join("player_stats.json")
    }

    pub fn head_to_head_path(&self) -> PathBuf {
        self.derived_dir().join("head_to_head.json")
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.data_dir.join("aliases.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Read a whole JSON document. A parse failure is fatal.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a value as pretty-printed JSON, replacing the file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Load fetched raw events.
pub fn load_raw_events(path: &Path) -> Result<RawEventMap, StorageError> {
    let events: RawEventMap = read_json(path)?;
    info!("Loaded {} raw events from {:?}", events.len(), path);
    Ok(events)
}

/// Load a match collection from JSONL or a JSON array.
///
/// Individual records that do not parse are logged and skipped; a file that
/// is not a JSON array at all is an error.
pub fn load_matches(path: &Path) -> Result<Vec<Match>, StorageError> {
    if is_jsonl(path) {
        return JsonlReader::new(path).read_all();
    }

    let values: Vec<serde_json::Value> = read_json(path)?;
    let mut matches = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(m) => matches.push(m),
            Err(e) => warn!("Skipping match record {} in {:?}: {}", index, path, e),
        }
    }

    info!("Loaded {} matches from {:?}", matches.len(), path);
    Ok(matches)
}

/// Save a match collection as JSONL or a JSON array, by file extension.
pub fn save_matches(path: &Path, matches: &[Match]) -> Result<(), StorageError> {
    if is_jsonl(path) {
        JsonlWriter::new(path).write_all(matches)?;
    } else {
        write_json(path, matches)?;
        info!("Wrote {} matches to {:?}", matches.len(), path);
    }
    Ok(())
}

/// Load an alias table from JSON or TOML. A missing file is an empty table.
pub fn load_alias_table(path: &Path) -> Result<AliasTable, StorageError> {
    if !path.exists() {
        info!("No alias table at {:?}, names resolve to themselves", path);
        return Ok(AliasTable::new());
    }

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let aliases = if is_toml {
        let raw: BTreeMap<String, String> = toml::from_str(&fs::read_to_string(path)?)?;
        AliasTable::from(raw)
    } else {
        read_json(path)?
    };

    info!("Loaded {} aliases from {:?}", aliases.len(), path);
    Ok(aliases)
}

/// Persist both derived stores.
pub fn save_aggregation(
    config: &StorageConfig,
    aggregation: &Aggregation,
) -> Result<(), StorageError> {
    write_json(&config.player_stats_path(), &aggregation.players)?;
    write_json(&config.head_to_head_path(), &aggregation.head_to_head)?;
    info!(
        "Saved statistics for {} players to {:?}",
        aggregation.players.len(),
        config.derived_dir()
    );
    Ok(())
}

/// Load both derived stores written by [`save_aggregation`].
pub fn load_aggregation(config: &StorageConfig) -> Result<Aggregation, StorageError> {
    let players: PlayerStatsStore = read_json(&config.player_stats_path())?;
    let head_to_head: HeadToHeadIndex = read_json(&config.head_to_head_path())?;
    Ok(Aggregation {
        players,
        head_to_head,
    })
}
