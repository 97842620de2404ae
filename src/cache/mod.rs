//! Cache layer
//!
//! Popularity rankings are the expensive part of every page (grouped counts
//! over likes and tag links), so services keep them in a cache.
//! It supports:
//! - In-memory cache (moka) - default
//! - Disabled - every lookup misses, for debugging or strict freshness
//!
//! The cache driver is selected based on configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inkblog::cache::{create_cache, CacheLayer};
//! use inkblog::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default())?;
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache layer trait
///
/// This trait has generic methods, so it cannot be used as a trait object
/// (`dyn CacheLayer`). Use the `Cache` enum for runtime polymorphism.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

pub use memory::MemoryCache;

/// Unified cache enum for runtime polymorphism
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
    /// No caching: reads miss, writes are dropped
    Disabled,
}

impl Cache {
    /// TTL configured for this cache; zero when disabled
    pub fn default_ttl(&self) -> Duration {
        match self {
            Cache::Memory(cache) => cache.default_ttl(),
            Cache::Disabled => Duration::ZERO,
        }
    }

    /// Store a value computed after `generation` read `seen`
    ///
    /// Nothing is kept if an invalidation bumped `generation` since then,
    /// including one that lands while the value is being written.
    pub async fn fill<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        generation: &Generation,
        seen: u64,
    ) -> Result<()> {
        if generation.current() != seen {
            return Ok(());
        }
        self.set(key, value, ttl).await?;
        if generation.current() != seen {
            self.delete(key).await?;
        }
        Ok(())
    }
}

/// Invalidation counter for cache-aside fills
///
/// Readers take `current()` before querying and store through
/// `Cache::fill`. Invalidators call `bump()` before deleting keys.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            Cache::Disabled => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            Cache::Disabled => Ok(()),
        }
    }
}

/// Create a cache instance based on configuration
///
/// - `CacheDriver::Memory` - an in-memory moka cache using `ttl_seconds`
/// - `CacheDriver::None` - a disabled cache
pub fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        CacheDriver::Memory => {
            if ttl.is_zero() {
                anyhow::bail!("cache.ttl_seconds must be greater than zero for the memory driver");
            }
            let cache = MemoryCache::with_capacity_and_ttl(10_000, ttl);
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::None => Ok(Arc::new(Cache::Disabled)),
    }
}
