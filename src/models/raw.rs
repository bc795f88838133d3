//! Raw bracket records as delivered by the tournament API fetcher.
//!
//! Every field is optional: the fetcher stores whatever the API returned and
//! validation happens in [`crate::normalize`]. An event or set that does not
//! even have the expected shape is read as an empty record, which
//! normalization then skips, so one bad record never fails the whole file.

use std::{iter, slice};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// Raw events keyed by the fetcher's event key (usually the event slug), in
/// the order the fetcher wrote them.
#[derive(Debug, Clone, Default)]
pub struct RawEventMap {
    events: Vec<Entry>,
}

type Entry = (String, RawEvent);
type EntryRef<'a> = (&'a String, &'a RawEvent);
type EntryRefs<'a> = iter::Map<slice::Iter<'a, Entry>, fn(&'a Entry) -> EntryRef<'a>>;

impl RawEventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event, or replace the event with the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, event: RawEvent) {
        let key = key.into();
        match self.events.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = event,
            None => self.events.push((key, event)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawEvent> {
        self.events
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, event)| event)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> EntryRefs<'_> {
        self.into_iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<'a> IntoIterator for &'a RawEventMap {
    type Item = EntryRef<'a>;
    type IntoIter = EntryRefs<'a>;

    fn into_iter(self) -> Self::IntoIter {
        let split: fn(&'a Entry) -> EntryRef<'a> = |(key, event)| (key, event);
        self.events.iter().map(split)
    }
}

impl Serialize for RawEventMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for RawEventMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's `preserve_order` keeps this map in document order.
        let raw = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let events = raw
            .into_iter()
            .map(|(key, value)| {
                let event = lenient(value, || format!("event {}", key));
                (key, event)
            })
            .collect();
        Ok(Self { events })
    }
}

/// Parse a record, falling back to an empty one when the shape is wrong.
fn lenient<T, F>(value: Value, describe: F) -> T
where
    T: serde::de::DeserializeOwned + Default,
    F: FnOnce() -> String,
{
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!("Unreadable raw {}: {}", describe(), e);
        T::default()
    })
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_sets<'de, D>(deserializer: D) -> Result<Option<Vec<RawSet>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(values.map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| lenient(value, || format!("set at index {}", index)))
            .collect()
    }))
}

/// One fetched event with its sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub tournament_name: Option<String>,
    pub event_name: Option<String>,
    pub event_id: Option<u64>,
    /// Event start (epoch seconds)
    pub start_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient_sets")]
    pub sets: Option<Vec<RawSet>>,
}

/// One set inside an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSet {
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slots: Vec<RawSlot>,
    pub set_score: Option<RawSetScore>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSlot {
    pub entrant: Option<RawEntrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntrant {
    pub id: Option<u64>,
    pub name: Option<String>,
}

/// Score structure fetched separately for each set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSetScore {
    pub completed_at: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slots: Vec<RawScoreSlot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScoreSlot {
    pub standing: Option<RawStanding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStanding {
    pub placement: Option<u32>,
    pub stats: Option<RawStandingStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStandingStats {
    pub score: Option<RawScore>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScore {
    /// Games won; the API reports -1 for disqualifications
    pub value: Option<i64>,
}

impl RawStanding {
    /// Numeric game score, if the API reported one.
    pub fn score_value(&self) -> Option<i64> {
        self.stats.as_ref()?.score.as_ref()?.value
    }
}
