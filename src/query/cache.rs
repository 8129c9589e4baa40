use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::rows::VisitMetrics;

/// Thread-safe visit-summary cache with TTL-based expiration.
///
/// Keys are `(site, day, segment)` summary keys; values are the seven-field
/// day summary. This is the collaborator that lets a segmented archiver
/// reuse the canonical summary computed for another report instead of
/// re-scanning the visit log. At-most-once computation across concurrent
/// archivers is the cache owner's concern, not enforced here.
#[derive(Clone)]
pub struct SummaryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

struct CacheEntry {
    value: VisitMetrics,
    inserted_at: Instant,
}

impl SummaryCache {
    /// Create a new cache with the given TTL in seconds.
    /// A TTL of 0 disables caching (all lookups miss).
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Look up a cached summary by key. Returns `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<VisitMetrics> {
        if self.ttl.is_zero() {
            return None;
        }
        self.entries.lock().get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() > self.ttl {
                None
            } else {
                Some(entry.value)
            }
        })
    }

    /// Insert a summary into the cache.
    pub fn insert(&self, key: String, value: VisitMetrics) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries from the cache.
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
    }

    /// Returns the number of entries currently in the cache.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
