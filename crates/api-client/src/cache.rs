// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory cache owned by the component using it
//!
//! Adapters that look up slow-changing metadata (token decimals, collection
//! details) keep a [`TtlCache`] next to their pipeline instead of a process-wide
//! memo, so every instance can be configured and cleared on its own.

use std::{
    hash::Hash,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct CachedValue<V> {
    value: V,
    cached_at: Instant,
    last_access: Instant,
    access_count: u64,
}

impl<V> CachedValue<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            cached_at: now,
            last_access: now,
            access_count: 0,
        }
    }

    fn is_valid(&self, ttl: Option<Duration>) -> bool {
        ttl.is_none_or(|ttl| self.cached_at.elapsed() < ttl)
    }
}

/// Concurrent cache with optional expiry and least-recently-used eviction
///
/// A `None` TTL keeps entries until they are evicted or the cache is cleared.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CachedValue<V>>,
    ttl: Option<Duration>,
    max_entries: usize,
    stats: DashMap<&'static str, u64>,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored
    pub entry_count: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries stored
    pub stores: u64,
    /// Entries evicted to make room
    pub evictions: u64,
    /// Entries dropped after their TTL passed
    pub expired: u64,
    /// `hits / (hits + misses)`, 0 before any lookup
    pub hit_rate: f64,
    /// Capacity
    pub max_entries: usize,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(None, DEFAULT_MAX_ENTRIES)
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_entries` values for `ttl`
    pub fn new(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            stats: DashMap::new(),
        }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cached value for `key`, dropping it if expired
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(mut cached) = self.entries.get_mut(key) {
            if cached.is_valid(self.ttl) {
                cached.access_count += 1;
                cached.last_access = Instant::now();
                self.increment_stat("hits");
                return Some(cached.value.clone());
            }
            drop(cached);
            self.entries.remove(key);
            self.increment_stat("expired");
            trace!("expired cache entry removed");
        }

        self.increment_stat("misses");
        None
    }

    /// Store `value` under `key`, evicting the least recently used entry when full
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.remove_expired();
            if self.entries.len() >= self.max_entries {
                self.evict_least_recently_used();
            }
        }

        self.entries.insert(key, CachedValue::new(value));
        self.increment_stat("stores");
        trace!(
            size = self.entries.len(),
            max_entries = self.max_entries,
            "stored cache entry"
        );
    }

    /// Cached value for `key`, computing and storing it with `fetch` on a miss
    ///
    /// Errors from `fetch` are returned and nothing is stored.
    ///
    /// # Errors
    ///
    /// Whatever `fetch` returns
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Number of stored entries, expired ones included until next touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
        debug!("cleared cache");
    }

    /// Drop expired entries, returning how many were removed
    pub fn remove_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.is_valid(self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        for _ in 0..removed {
            self.increment_stat("expired");
        }
        removed
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        let hits = self.get_stat("hits");
        let misses = self.get_stat("misses");
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };

        CacheStats {
            entry_count: self.entries.len(),
            hits,
            misses,
            stores: self.get_stat("stores"),
            evictions: self.get_stat("evictions"),
            expired: self.get_stat("expired"),
            hit_rate,
            max_entries: self.max_entries,
        }
    }

    fn evict_least_recently_used(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|item| (item.value().last_access, item.value().access_count))
            .map(|item| item.key().clone());

        if let Some(key) = oldest
            && let Some((_, entry)) = self.entries.remove(&key)
        {
            self.increment_stat("evictions");
            debug!(
                access_count = entry.access_count,
                age_ms = entry.cached_at.elapsed().as_millis(),
                remaining_entries = self.entries.len(),
                "evicted lru cache entry due to capacity limit"
            );
        }
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats.entry(key).and_modify(|v| *v += 1).or_insert(1);
    }

    fn get_stat(&self, key: &'static str) -> u64 {
        self.stats.get(key).map_or(0, |v| *v)
    }
}
