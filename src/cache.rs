//! In-memory cache of [`LexicalFacts`] keyed by normalized SQL hash.
//!
//! The lexical extraction stage re-parses the same statement on every
//! `diagnose`/`analyze_sql` call if a caller re-submits it (e.g. a CI job
//! re-checking an unchanged migration file). This cache lets a caller skip
//! that work for statements it has already extracted. Eviction is a simple
//! "clear half when full" strategy; this is a size bound, not an LRU,
//! since hit-rate here matters more than perfect recency.

use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
    sync::{LazyLock, RwLock}
};

use crate::lexical::LexicalFacts;

/// Global lexical-facts cache with default capacity of 1000 entries.
static FACTS_CACHE: LazyLock<RwLock<FactsCache>> = LazyLock::new(|| RwLock::new(FactsCache::new(1000)));

/// Thread-safe cache for extracted [`LexicalFacts`], keyed by a hash of the
/// sanitized SQL string.
pub struct FactsCache {
    cache:    HashMap<u64, LexicalFacts>,
    max_size: usize
}

impl FactsCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_size),
            max_size
        }
    }

    fn hash_key(sql: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        sql.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, sql: &str) -> Option<LexicalFacts> {
        let key = Self::hash_key(sql);
        self.cache.get(&key).cloned()
    }

    /// Insert extracted facts into the cache.
    ///
    /// Simple eviction: clear half when full - this workload never needs
    /// strict recency, only a size bound.
    pub fn insert(&mut self, sql: &str, facts: LexicalFacts) {
        if self.cache.len() >= self.max_size {
            let keys: Vec<_> = self.cache.keys().take(self.max_size / 2).copied().collect();
            for key in keys {
                self.cache.remove(&key);
            }
        }
        let key = Self::hash_key(sql);
        self.cache.insert(key, facts);
    }
}

/// Get cached facts for a sanitized SQL string, or `None` on a miss.
pub fn get_cached(sql: &str) -> Option<LexicalFacts> {
    FACTS_CACHE.read().ok()?.get(sql)
}

/// Cache extracted facts for a sanitized SQL string.
pub fn cache_facts(sql: &str, facts: LexicalFacts) {
    if let Ok(mut cache) = FACTS_CACHE.write() {
        cache.insert(sql, facts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::LexicalFacts;

    #[test]
    fn round_trips_through_cache() {
        let sql = "SELECT id FROM users WHERE status = 1";
        assert!(get_cached(sql).is_none());

        let facts = LexicalFacts::new(sql.to_string());
        cache_facts(sql, facts);

        assert!(get_cached(sql).is_some());
    }

    #[test]
    fn evicts_half_when_full() {
        let mut cache = FactsCache::new(4);
        for i in 0..4 {
            let sql = format!("SELECT {i}");
            cache.insert(&sql, LexicalFacts::new(sql.clone()));
        }
        assert_eq!(cache.cache.len(), 4);
        cache.insert("SELECT 4", LexicalFacts::new("SELECT 4".to_string()));
        assert!(cache.cache.len() <= 4);
    }
}
