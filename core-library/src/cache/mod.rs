//! Offline and query caches

pub mod keys;
pub mod offline;
pub mod query;

pub use keys::CacheKey;
pub use offline::OfflineCache;
pub use query::{QueryCache, DEFAULT_QUERY_CACHE_CAPACITY};
