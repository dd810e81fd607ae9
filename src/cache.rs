//! Memo tables for expensive per-community computations.
//!
//! Entries are keyed by pure inputs, never invalidated and shared as `Arc`s. The value is
//! computed outside the lock; if two threads race on the same key the first insert wins and
//! both callers receive that entry.

use crate::graph::{ContributorGraph, GraphKind};
use crate::value::Key;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use time::OffsetDateTime;

pub struct Memo<K, V> {
    entries: Mutex<AHashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> Default for Memo<K, V> {
    fn default() -> Self { Self { entries: Mutex::new(AHashMap::new()) } }
}

impl<K: Eq + Hash + Clone, V> Memo<K, V> {
    pub fn get(&self, key: &K) -> Option<Arc<V>> { self.entries.lock().get(key).cloned() }

    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = Arc::new(compute());
        self.entries.lock().entry(key).or_insert(value).clone()
    }

    /// Fallible variant; errors are not cached.
    pub fn get_or_try_insert_with<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<Arc<V>, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = Arc::new(compute()?);
        Ok(self.entries.lock().entry(key).or_insert(value).clone())
    }
}

/// `(start, end, kind)` of a temporal graph snapshot.
pub type TemporalKey = (Option<OffsetDateTime>, Option<OffsetDateTime>, GraphKind);

/// Caches owned by one community. Dropped together with it.
#[derive(Default)]
pub struct CommunityCache {
    pub(crate) graphs: Memo<TemporalKey, ContributorGraph>,
    /// Temporal degree centralities keyed by `(metric, end, kind)`.
    pub(crate) centralities: Memo<(String, OffsetDateTime, GraphKind), AHashMap<Key, f64>>,
    /// Per-contributor thread, comment and activity-day index (one entry, unit key).
    pub(crate) activity: Memo<(), crate::metrics::cached::ContributorActivity>,
    /// Pairwise initial-post similarities keyed by `(text column, similarity metric)`.
    pub(crate) similarity: Memo<(String, String), crate::metrics::cached::SimilarityNetwork>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_recomputed_and_hits_are_shared() {
        let memo: Memo<u32, String> = Memo::default();
        let err: Result<Arc<String>, &str> = memo.get_or_try_insert_with(1, || Err("not yet"));
        assert_eq!(err.unwrap_err(), "not yet");
        assert!(memo.get(&1).is_none());

        let first = memo.get_or_try_insert_with(1, || Ok::<_, &str>("one".to_string())).unwrap();
        let again = memo.get_or_insert_with(1, || "other".to_string());
        assert!(Arc::ptr_eq(&first, &again));
    }
}
