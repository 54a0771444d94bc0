//! TTL + LRU storage behind the global feed cache.
//!
//! Entries are never invalidated by writes to the post store: a populated
//! page keeps being served until its TTL runs out or [`PageCache::clear_all`]
//! is called.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;

const SOURCE: &str = "cache::store";

/// Cache key for a composed listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageCacheKey {
    /// The unfiltered global feed, keyed by the page number as requested
    /// (before clamping), so `/?page=7` and `/?page=2` are separate entries.
    GlobalFeed { page: u32 },
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared, time-boxed cache of composed feed pages.
///
/// Reads take the shared lock and use `peek`, so concurrent readers never
/// block each other. Two requests racing to populate the same key both
/// write; the later value wins.
pub struct PageCache<V> {
    ttl: Duration,
    entries: RwLock<LruCache<PageCacheKey, Entry<V>>>,
}

impl<V: Clone> PageCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a fresh entry. Expired entries are dropped and reported as a miss.
    pub fn get(&self, key: &PageCacheKey) -> Option<V> {
        let now = Instant::now();
        let expired = {
            let guard = read(&self.entries, "get");
            match guard.peek(key) {
                Some(entry) if entry.is_fresh(now) => {
                    counter!("yatube_page_cache_hit_total").increment(1);
                    debug!(cache = "page", outcome = "hit", ?key, "serving cached page");
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut guard = write(&self.entries, "get.expire");
            // Another request may have repopulated the key in between.
            let still_stale = guard.peek(key).is_some_and(|entry| !entry.is_fresh(now));
            if still_stale {
                guard.pop(key);
                counter!("yatube_page_cache_expired_total").increment(1);
                debug!(cache = "page", outcome = "expired", ?key, "dropped stale page");
            }
        }

        counter!("yatube_page_cache_miss_total").increment(1);
        None
    }

    /// Store a value under `key`, starting a new TTL window.
    pub fn insert(&self, key: PageCacheKey, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        write(&self.entries, "insert").put(key, entry);
    }

    /// Evict every entry regardless of freshness.
    pub fn clear_all(&self) {
        write(&self.entries, "clear_all").clear();
        counter!("yatube_page_cache_clear_total").increment(1);
        debug!(cache = "page", "cleared all cached pages");
    }

    /// Number of entries that are still fresh.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        read(&self.entries, "len")
            .iter()
            .filter(|(_, entry)| entry.is_fresh(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = SOURCE,
            lock_kind = "rwlock.read",
            result = "poisoned_recovered",
            "Recovered from poisoned page cache lock"
        );
        poisoned.into_inner()
    })
}

fn write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = SOURCE,
            lock_kind = "rwlock.write",
            result = "poisoned_recovered",
            "Recovered from poisoned page cache lock"
        );
        poisoned.into_inner()
    })
}
