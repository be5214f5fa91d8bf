//! Process-wide store for descriptive metadata.
//!
//! Metadata is for low-churn facts (hardware inventory, interface
//! descriptions), never for time-series values. Entries are keyed by
//! `(metric, tags, key)`. Many collectors write concurrently, so all writes go
//! through a single write lock and readers get a consistent snapshot.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::metric::TagSet;

/// Scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetaValue::UInt(v) => Some(*v),
            MetaValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Text(s) => write!(f, "{}", s),
            MetaValue::Int(v) => write!(f, "{}", v),
            MetaValue::UInt(v) => write!(f, "{}", v),
            MetaValue::Float(v) => write!(f, "{}", v),
            MetaValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<u64> for MetaValue {
    fn from(v: u64) -> Self {
        MetaValue::UInt(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

/// Outbound metadata record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    pub tags: TagSet,
    pub key: String,
    pub value: MetaValue,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MetaKey {
    metric: Option<String>,
    tags: TagSet,
    key: String,
}

impl MetaKey {
    fn new(metric: &str, tags: &TagSet, key: &str) -> Self {
        Self {
            metric: (!metric.is_empty()).then(|| metric.to_string()),
            tags: tags.clone(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct MetaEntry {
    value: MetaValue,
    overwrite: bool,
}

/// Shared metadata store. Wrap in an `Arc` to share between collectors.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: RwLock<BTreeMap<MetaKey, MetaEntry>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a metadata fact.
    ///
    /// An empty `metric` means the fact is not tied to a metric. When an entry
    /// already exists and `overwrite` is false the call is a no-op: the first
    /// writer wins. Returns whether the store changed.
    pub fn add_meta(
        &self,
        metric: &str,
        tags: &TagSet,
        key: &str,
        value: impl Into<MetaValue>,
        overwrite: bool,
    ) -> bool {
        let meta_key = MetaKey::new(metric, tags, key);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if !overwrite && entries.contains_key(&meta_key) {
            return false;
        }

        entries.insert(
            meta_key,
            MetaEntry {
                value: value.into(),
                overwrite,
            },
        );
        true
    }

    /// Looks up a single value.
    pub fn get(&self, metric: &str, tags: &TagSet, key: &str) -> Option<MetaValue> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&MetaKey::new(metric, tags, key))
            .map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies out every entry under one read lock, sorted by metric, tags and
    /// key.
    pub fn snapshot(&self) -> Vec<MetadataRecord> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(k, e)| MetadataRecord {
                metric: k.metric.clone(),
                tags: k.tags.clone(),
                key: k.key.clone(),
                value: e.value.clone(),
                overwrite: e.overwrite,
            })
            .collect()
    }
}
