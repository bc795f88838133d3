//! Player identity resolution.
//!
//! Display names arrive with sponsor/team tags (`"TAG | Name"`) and players
//! change tags over time. Resolution happens in two steps:
//! 1. Normalize: strip everything up to the first `"| "` and trim
//! 2. Canonicalize: look the normalized name up in an [`AliasTable`]
//!
//! The alias table is always passed in explicitly; nothing here holds global state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between a tag prefix and the player name.
pub const TAG_SEPARATOR: &str = "| ";

/// Strip a `"<prefix> | "` tag segment and surrounding whitespace. Case-sensitive.
pub fn normalize_name(raw: &str) -> &str {
    match raw.find(TAG_SEPARATOR) {
        Some(index) => raw[index + TAG_SEPARATOR.len()..].trim(),
        None => raw.trim(),
    }
}

/// Mapping from normalized alias to canonical name.
///
/// Chains (`a -> b`, `b -> c`) are flattened on construction so that every
/// alias points directly at a name that resolves to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for AliasTable {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let aliases = raw
            .keys()
            .map(|alias| (alias.clone(), follow_chain(&raw, alias)))
            .collect();
        Self { aliases }
    }
}

impl From<AliasTable> for BTreeMap<String, String> {
    fn from(table: AliasTable) -> Self {
        table.aliases
    }
}

impl<A: Into<String>, C: Into<String>> FromIterator<(A, C)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (A, C)>>(iter: I) -> Self {
        let raw: BTreeMap<String, String> = iter
            .into_iter()
            .map(|(alias, canonical)| (alias.into(), canonical.into()))
            .collect();
        Self::from(raw)
    }
}

/// Follow alias links from `start` to a name with no further mapping.
///
/// Cycles resolve to the lexicographically smallest name in the cycle.
fn follow_chain(raw: &BTreeMap<String, String>, start: &str) -> String {
    let mut path: Vec<&str> = vec![start];
    let mut current = start;

    while let Some(next) = raw.get(current) {
        if next == current {
            break;
        }
        if let Some(pos) = path.iter().position(|p| *p == next.as_str()) {
            let smallest = path[pos..].iter().copied().min().unwrap_or(next.as_str());
            warn!("Alias cycle through '{}', resolving to '{}'", start, smallest);
            return smallest.to_string();
        }
        path.push(next.as_str());
        current = next.as_str();
    }

    current.to_string()
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical name for a normalized alias, if one is mapped.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// All aliases pointing at `canonical`.
    pub fn aliases_of<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases
            .iter()
            .filter(move |(_, c)| c.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
    }

    /// Distinct canonical names in the table.
    pub fn canonical_names(&self) -> BTreeSet<&str> {
        self.aliases.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Resolves raw display names against an alias table.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    aliases: &'a AliasTable,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        Self { aliases }
    }

    pub fn normalize<'n>(&self, raw: &'n str) -> &'n str {
        normalize_name(raw)
    }

    /// Canonical identity for any raw display name. Unknown names map to themselves.
    pub fn resolve_canonical(&self, raw: &str) -> String {
        let normalized = normalize_name(raw);
        self.aliases
            .get(normalized)
            .unwrap_or(normalized)
            .to_string()
    }

    /// Every name known to belong to the same identity as `raw`,
    /// including the canonical name and the normalized input.
    pub fn expand_aliases(&self, raw: &str) -> BTreeSet<String> {
        let normalized = normalize_name(raw);
        let canonical = self.resolve_canonical(raw);

        let mut names: BTreeSet<String> = self
            .aliases
            .aliases_of(&canonical)
            .map(str::to_string)
            .collect();
        names.insert(normalized.to_string());
        names.insert(canonical);
        names
    }

    /// Whether two raw names resolve to the same identity.
    pub fn same_identity(&self, a: &str, b: &str) -> bool {
        self.resolve_canonical(a) == self.resolve_canonical(b)
    }
}
