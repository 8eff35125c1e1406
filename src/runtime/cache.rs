// src/runtime/cache.rs
// ============================================================================
// Module: Agent Engine Result Cache
// Description: Keyed byte store with per-entry TTL and LRU eviction.
// Purpose: Let the tool executor skip re-running cacheable, idempotent tools.
// Dependencies: crate::core::time::{Clock, Timestamp}
// ============================================================================

//! ## Overview
//! The cache is bounded by `max_size`; when at capacity, the entry with the
//! oldest `last_access` is evicted to make room. Expired entries are treated
//! as misses on `get` and lazily removed; [`Cache::cleanup`] purges all
//! currently expired entries eagerly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::time::Clock;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`Cache`] operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key was empty.
    #[error("cache key must not be empty")]
    InvalidKey,
    /// The operation was cancelled before it completed.
    #[error("cache operation cancelled")]
    Cancelled,
}

/// Default maximum number of cache entries, per the specification's
/// `CacheMaxSize` default.
pub const DEFAULT_MAX_SIZE: usize = 1_000;

// ============================================================================
// SECTION: Entry
// ============================================================================

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Timestamp,
    last_access: Timestamp,
}

impl Entry {
    fn is_expired(&self, now: Timestamp) -> bool {
        !self.expires_at.is_zero() && now > self.expires_at
    }
}

/// Hit/miss/size statistics exposed by [`Cache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Total `get` calls that found a live entry.
    pub hits: u64,
    /// Total `get` calls that found no entry or an expired one.
    pub misses: u64,
    /// Current number of stored entries.
    pub size: usize,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

struct Inner {
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

/// Keyed byte cache with TTL expiry and LRU eviction.
pub struct Cache {
    clock: std::sync::Arc<dyn Clock>,
    max_size: usize,
    inner: Mutex<Inner>,
}

impl Cache {
    /// Creates a new, empty cache bounded by `max_size` entries.
    #[must_use]
    pub fn new(clock: std::sync::Arc<dyn Clock>, max_size: usize) -> Self {
        Self { clock, max_size: max_size.max(1), inner: Mutex::new(Inner { entries: HashMap::new(), hits: 0, misses: 0 }) }
    }

    /// Returns the value stored under `key`, or `None` if absent or
    /// expired. Expired entries are removed as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for an empty key.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let expired = inner.entries.get(key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            inner.entries.remove(key);
        }
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                inner.hits += 1;
                Ok(Some(entry.value.clone()))
            }
            None => {
                inner.misses += 1;
                Ok(None)
            }
        }
    }

    /// Stores `value` under `key` with the given TTL in milliseconds
    /// (`0` means never expires). Evicts the least-recently-accessed entry
    /// if the cache is at capacity and `key` is new.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for an empty key.
    pub fn set(&self, key: &str, value: &[u8], ttl_millis: i64) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        let now = self.clock.now();
        let expires_at =
            if ttl_millis <= 0 { Timestamp::ZERO } else { Timestamp::from_unix_millis(now.as_unix_millis() + ttl_millis) };
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_size {
            Self::evict_lru(&mut inner.entries);
        }
        inner.entries.insert(key.to_string(), Entry { value: value.to_vec(), expires_at, last_access: now });
        Ok(())
    }

    fn evict_lru(entries: &mut HashMap<String, Entry>) {
        if let Some(key) = entries.iter().min_by_key(|(_, entry)| entry.last_access).map(|(key, _)| key.clone()) {
            entries.remove(&key);
        }
    }

    /// Removes the entry stored under `key`, if any.
    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.entries.remove(key);
    }

    /// Eagerly removes every currently expired entry.
    pub fn cleanup(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Returns current hit/miss/size statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        CacheStats { hits: inner.hits, misses: inner.misses, size: inner.entries.len() }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;
    use crate::core::time::FixedClock;

    fn cache_with_clock(max_size: usize) -> (Cache, std::sync::Arc<FixedClock>) {
        let clock = std::sync::Arc::new(FixedClock::new(1_000));
        (Cache::new(clock.clone(), max_size), clock)
    }

    #[test]
    fn set_then_get_with_zero_ttl_never_expires() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("k", b"v", 0).expect("set succeeds");
        clock.advance(1_000_000);
        assert_eq!(cache.get("k").expect("get succeeds"), Some(b"v".to_vec()));
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("k", b"v", 100).expect("set succeeds");
        clock.advance(101);
        assert_eq!(cache.get("k").expect("get succeeds"), None);
    }

    #[test]
    fn delete_removes_entry() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set("k", b"v", 0).expect("set succeeds");
        cache.delete("k");
        assert_eq!(cache.get("k").expect("get succeeds"), None);
    }

    #[test]
    fn eviction_removes_least_recently_accessed_at_capacity() {
        let (cache, clock) = cache_with_clock(2);
        cache.set("a", b"1", 0).expect("set succeeds");
        clock.advance(10);
        cache.set("b", b"2", 0).expect("set succeeds");
        clock.advance(10);
        // touch "a" so "b" becomes least-recently-accessed
        cache.get("a").expect("get succeeds");
        clock.advance(10);
        cache.set("c", b"3", 0).expect("set succeeds");

        assert_eq!(cache.get("b").expect("get succeeds"), None);
        assert_eq!(cache.get("a").expect("get succeeds"), Some(b"1".to_vec()));
        assert_eq!(cache.get("c").expect("get succeeds"), Some(b"3".to_vec()));
    }

    #[test]
    fn empty_key_is_rejected() {
        let (cache, _clock) = cache_with_clock(10);
        assert!(matches!(cache.set("", b"v", 0), Err(CacheError::InvalidKey)));
        assert!(matches!(cache.get(""), Err(CacheError::InvalidKey)));
    }

    #[test]
    fn cleanup_purges_expired_entries_eagerly() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("k", b"v", 50).expect("set succeeds");
        clock.advance(100);
        cache.cleanup();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let (cache, _clock) = cache_with_clock(10);
        cache.set("k", b"v", 0).expect("set succeeds");
        cache.get("k").expect("get succeeds");
        cache.get("missing").expect("get succeeds");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }
}
