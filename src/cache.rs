//! Process-lifetime cache for computed analysis results.
//!
//! Keys are composed by the engines (`"<variable>:<method>"`); payloads
//! are the serialized result mappings. Entries are created or overwritten
//! on each cached computation, cleared explicitly, and never expire on
//! their own. Single-threaded access only: wrap in a concurrency-safe map
//! before sharing across workers.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;

/// One cached result with its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Serialized result mapping.
    pub payload: Value,
    /// Top-level field names of the payload at insertion time.
    pub fields: Vec<String>,
    /// When the result was computed.
    pub computed_at: Timestamp,
}

/// Key -> result store with last-write-wins overwrite semantics.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    entries: HashMap<String, CacheEntry>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `key`.
    ///
    /// The stored field-name set is taken from the payload's top-level
    /// object keys (empty for non-object payloads).
    pub fn insert(&mut self, key: impl Into<String>, payload: Value) {
        let fields = match &payload {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        self.entries.insert(
            key.into(),
            CacheEntry {
                payload,
                fields,
                computed_at: Timestamp::now(),
            },
        );
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Whether `key` has a cached result.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over cached keys (arbitrary order).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}
