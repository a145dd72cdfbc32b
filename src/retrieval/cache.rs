//! Query result cache
//!
//! Memoizes complete search responses keyed by a query signature. The cache
//! is the only state shared across concurrent queries; entries are read and
//! written at single-key granularity, first writer wins, and a duplicate
//! concurrent computation simply overwrites with an equivalent value.

use crate::retrieval::{SearchQuery, SearchResponse};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Contract for result caches
pub trait ResultCache: Send + Sync {
    /// Fetch a non-expired response for the key
    fn get(&self, key: &str) -> Option<SearchResponse>;

    /// Store a response under the key with the given TTL
    fn set(&self, key: String, value: SearchResponse, ttl: Duration);
}

/// Cache key: hash of the query signature (text, mode, top_k, threshold)
pub fn query_cache_key(query: &SearchQuery) -> String {
    let signature = format!(
        "{}|{}|{}|{}",
        query.text,
        query.mode.as_str(),
        query.top_k,
        query.similarity_threshold
    );
    format!("{:.32}", blake3::hash(signature.as_bytes()).to_hex())
}

struct CacheEntry {
    value: SearchResponse,
    expires_at: Instant,
    inserted_at: Instant,
}

/// Bounded in-memory cache with per-entry TTL
///
/// When full, the oldest entry is evicted to make room.
pub struct MemoryCache {
    entries: RwLock<ahash::HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(ahash::HashMap::default()),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<SearchResponse> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {} // expired, remove below
                None => return None,
            }
        }

        self.entries.write().unwrap().remove(key);
        None
    }

    fn set(&self, key: String, value: SearchResponse, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
                inserted_at: now,
            },
        );
    }
}
