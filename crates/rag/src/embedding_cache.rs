//! Embedding Cache (C1)
//!
//! Grounded on `original_source/src/models/retrieval.py`'s `EmbeddingCache`:
//! a plain map plus an explicit LRU order list, with a configurable
//! capacity (`EMBED_CACHE_MAX`, default 4000 there). Locking follows the
//! teacher's `parking_lot::Mutex` convention for short, non-async critical
//! sections (spec §5: never held across network I/O).

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use sha1::{Digest, Sha1};

const DEFAULT_CAPACITY: usize = 4000;

struct Inner {
    store: HashMap<String, Vec<f32>>,
    /// Most-recently-used key is at the back.
    order: VecDeque<String>,
    capacity: usize,
}

/// Thread-safe LRU cache of document dense vectors, keyed by a stable
/// document id (falling back to a SHA-1 of the document's content when
/// no server-provided id is available).
pub struct EmbeddingCache {
    inner: Mutex<Inner>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Derives the cache key for a document: prefer `id` if non-empty,
    /// else SHA-1 of `content`.
    pub fn key_for(id: &str, content: &str) -> String {
        if !id.is_empty() {
            return id.to_string();
        }
        let mut hasher = Sha1::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        let found = inner.store.get(key).cloned();
        if found.is_some() {
            inner.order.retain(|k| k != key);
            inner.order.push_back(key.to_string());
        }
        found
    }

    pub fn put(&self, key: String, vector: Vec<f32>) {
        let mut inner = self.inner.lock();
        if inner.store.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.store.len() >= inner.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.store.remove(&evicted);
            }
        }
        inner.order.push_back(key.clone());
        inner.store.insert(key, vector);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_put_roundtrip() {
        let cache = EmbeddingCache::new(4000);
        cache.put("doc-1".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("doc-1"), Some(vec![1.0, 2.0]));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2);
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        cache.get("a"); // a is now most-recently-used
        cache.put("c".to_string(), vec![3.0]); // evicts b

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn key_for_prefers_id_over_hash() {
        let k1 = EmbeddingCache::key_for("doc-1", "content");
        assert_eq!(k1, "doc-1");
        let k2 = EmbeddingCache::key_for("", "content");
        assert_ne!(k2, "content");
        assert_eq!(k2.len(), 40); // SHA-1 hex digest
    }
}
