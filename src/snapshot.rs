//! Published acquisition results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::value::SnapshotValue;

/// Decoded key -> value pairs from one successful poll cycle.
///
/// A snapshot is only ever replaced as a whole. Keys whose read failed in
/// the cycle that produced it are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<String, SnapshotValue>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// An empty snapshot stamped with the current time
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            taken_at: Utc::now(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SnapshotValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(SnapshotValue::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(SnapshotValue::as_bool)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SnapshotValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// When the cycle that produced this snapshot finished
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub(crate) fn stamp(&mut self, at: DateTime<Utc>) {
        self.taken_at = at;
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
