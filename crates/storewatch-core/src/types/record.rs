//! Records, snapshots and deltas.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One entry of the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, rename = "official_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "image_url", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Why the stored payload could not be read as a record, if it couldn't.
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl Record {
    pub fn named(name: impl Into<String>) -> Self {
        Self { display_name: Some(name.into()), ..Default::default() }
    }

    /// Read one stored payload. A payload of the wrong shape still yields a
    /// record, marked malformed, so its key is tracked like any other.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| Self::malformed(e.to_string()))
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self { malformed: Some(reason.into()), ..Default::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Full key → record mapping as fetched at one instant.
///
/// Backed by an ordered map so iteration (and therefore delta order) is
/// sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Record>);

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(key, value)| (key, Record::from_value(value))).collect())
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, record: Record) {
        self.0.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Record)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, Record)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, r)| (k.into(), r)).collect())
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, Record);
    type IntoIter = std::collections::btree_map::IntoIter<String, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Entries present in the latest snapshot but unseen before it, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    entries: Vec<(String, Record)>,
}

impl Delta {
    pub fn push(&mut self, key: String, record: Record) {
        self.entries.push((key, record));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Record)> {
        self.entries.iter()
    }
}

impl IntoIterator for Delta {
    type Item = (String, Record);
    type IntoIter = std::vec::IntoIter<(String, Record)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
