//! Cache layer
//!
//! In-process caching backed by moka. Values are stored as JSON so any
//! serializable type can be cached under a string key.
//!
//! ```rust,ignore
//! use brickyard::cache::{create_cache, CacheLayer};
//! use brickyard::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("categories:page:1", &page).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods keep this trait off `dyn`; services hold the
/// concrete `Cache` type instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value for the cache's configured TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;
}

/// Cache used by the services
pub type Cache = MemoryCache;

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig {
            ttl_seconds: 60,
            max_capacity: 100,
        };
        let cache = create_cache(&config);

        cache.set("slug:cement", &1_i64).await.unwrap();
        let result: Option<i64> = cache.get("slug:cement").await.unwrap();
        assert_eq!(result, Some(1));
        assert_eq!(cache.default_ttl(), Duration::from_secs(60));
    }
}
