//! In-memory caches
//!
//! Volatile, cleared on restart. Uses Moka for high-performance
//! concurrent caching.
//!
//! Consumers address the cache only through the [`Cacher`] trait
//! (get/put/delete with byte values and TTLs), so a networked backend
//! can replace the in-process one without touching callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use crate::error::AppError;

/// Byte-value cache with per-entry TTL
#[async_trait]
pub trait Cacher: Send + Sync {
    /// Store a value under `key` for at most `ttl`.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AppError>;

    /// Fetch a value; `None` on miss or after TTL eviction.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Drop a value. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
struct Entry {
    value: Arc<Vec<u8>>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backend
pub struct MemoryCache {
    values: Cache<String, Entry>,
}

impl MemoryCache {
    /// Create a new memory cache.
    ///
    /// # Arguments
    /// * `max_items` - Maximum number of entries before LRU eviction
    pub fn new(max_items: u64) -> Self {
        let values = Cache::builder()
            .max_capacity(max_items)
            .expire_after(PerEntryTtl)
            .build();

        Self { values }
    }
}

#[async_trait]
impl Cacher for MemoryCache {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AppError> {
        let entry = Entry {
            value: Arc::new(value),
            ttl,
        };
        self.values.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let result = self.values.get(key).await;

        // Record cache hit/miss
        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["memory"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["memory"]).inc();
        }

        Ok(result.map(|entry| entry.value.as_ref().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.values.invalidate(key).await;
        Ok(())
    }
}
