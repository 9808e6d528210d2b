//! Manifest: the ordered list of items to process.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::ids::ItemId;

/// Opaque descriptor the fetch stage needs (URL-like).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocation(String);

impl SourceLocation {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The location as an absolute URL, `None` if it does not parse.
    pub fn parse(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }

    /// Scheme (`http`, `https`, `file`, ...) of a well-formed location.
    pub fn scheme(&self) -> Option<String> {
        self.parse().map(|url| url.scheme().to_owned())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One manifest line: display name and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub source: SourceLocation,
}

impl ManifestEntry {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceLocation::new(source),
        }
    }
}

/// The complete, ordered item set. Item ids are positions in this list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries paired with the id they will be scheduled under.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &ManifestEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (ItemId::new(idx as u64), entry))
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
