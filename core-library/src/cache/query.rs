//! # Query Cache
//!
//! In-memory cache of recent remote query results.
//!
//! ## Overview
//!
//! Holds the values catalog fetches produced this session so that the
//! download pipeline and artwork resolution can skip a network round trip
//! for data a view already loaded. Values are stored as JSON trees and
//! decoded on read; least recently used entries are evicted once the
//! capacity is reached.
//!
//! Entries are scoped by server id like the offline cache: the same song id
//! on two servers names two different songs.

use crate::cache::keys::CacheKey;
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 1024;

type ScopedKey = (String, CacheKey);

/// LRU cache of remote query results keyed by server and [`CacheKey`].
pub struct QueryCache {
    entries: Mutex<LruCache<ScopedKey, serde_json::Value>>,
}

fn scoped(server_id: &str, key: &CacheKey) -> ScopedKey {
    (server_id.to_string(), key.clone())
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, server_id: &str, key: &CacheKey) -> Option<T> {
        let value = self.entries.lock().get(&scoped(server_id, key)).cloned()?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(server_id, key = %key, error = %e, "Query cache entry has unexpected shape");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, server_id: &str, key: CacheKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                debug!(server_id, key = %key, "Query cache entry written");
                self.entries.lock().put((server_id.to_string(), key), value);
            }
            Err(e) => warn!(server_id, key = %key, error = %e, "Query cache value not serializable"),
        }
    }

    pub fn remove(&self, server_id: &str, key: &CacheKey) {
        self.entries.lock().pop(&scoped(server_id, key));
    }

    /// Drop every entry of one server.
    pub fn clear_server(&self, server_id: &str) {
        let mut entries = self.entries.lock();
        let stale: Vec<ScopedKey> = entries
            .iter()
            .filter(|((server, _), _)| server == server_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        debug!(server_id, removed = stale.len(), "Query cache cleared for server");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}
