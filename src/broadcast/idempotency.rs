//! TTL-bounded idempotency cache (spec §4.F).
//!
//! Keyed by the client-supplied `idempotency_key`; entries expire after
//! `CoreConfig::idempotency_ttl` and the map is capped at
//! `idempotency_cache_capacity`, oldest entry evicted first once full.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::model::PlayerStatus;

/// The cached outcome of a replayed command.
#[derive(Debug, Clone)]
pub enum CachedResult {
    Status(PlayerStatus),
    Error(CoreError),
}

struct Entry {
    result: CachedResult,
    inserted_at: Instant,
}

pub struct IdempotencyCache {
    entries: Mutex<HashMap<String, Entry>>,
    insertion_order: Mutex<Vec<String>>,
    ttl: Duration,
    capacity: usize,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            insertion_order: Mutex::new(Vec::new()),
            ttl,
            capacity,
        }
    }

    /// Returns the cached result if `key` was seen within the TTL. Expired
    /// entries are treated as a miss (lazily evicted on next insert).
    pub fn get(&self, key: &str) -> Option<CachedResult> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn insert(&self, key: String, result: CachedResult) {
        let mut entries = self.entries.lock().unwrap();
        let mut order = self.insertion_order.lock().unwrap();

        entries.retain(|_, v| v.inserted_at.elapsed() <= self.ttl);
        order.retain(|k| entries.contains_key(k));

        while entries.len() >= self.capacity {
            if order.is_empty() {
                break;
            }
            let oldest = order.remove(0);
            entries.remove(&oldest);
        }

        entries.insert(key.clone(), Entry { result, inserted_at: Instant::now() });
        order.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn replay_within_ttl_hits_cache() {
        let cache = IdempotencyCache::new(Duration::from_secs(60), 16);
        cache.insert("k1".into(), CachedResult::Error(CoreError::Timeout));
        assert!(matches!(cache.get("k1"), Some(CachedResult::Error(CoreError::Timeout))));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = IdempotencyCache::new(Duration::from_millis(10), 16);
        cache.insert("k1".into(), CachedResult::Error(CoreError::Timeout));
        sleep(Duration::from_millis(30));
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = IdempotencyCache::new(Duration::from_secs(60), 2);
        cache.insert("k1".into(), CachedResult::Error(CoreError::Timeout));
        cache.insert("k2".into(), CachedResult::Error(CoreError::Timeout));
        cache.insert("k3".into(), CachedResult::Error(CoreError::Timeout));
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k3").is_some());
    }
}
