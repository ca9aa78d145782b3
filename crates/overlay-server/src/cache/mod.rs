//! Two-tier resolution cache.
//!
//! ```text
//! resolve(user) → L1 (DashMap) → L2 (Redis) → OverrideStore
//! ```
//!
//! Entries expire a fixed interval after they are written; reads never extend
//! them. When Redis is disabled or unreachable at startup the server runs with
//! L1 only.

pub mod backend;
pub mod pubsub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use backend::{CacheBackend, CacheStats, CachedEntry, MAX_ENTRY_TTL};
pub use pubsub::{CacheInvalidationListener, INVALIDATION_CHANNEL, publish_invalidation};

/// Errors raised by a cache tier.
///
/// The resolver never fails a request because of these: reads degrade to a
/// miss and writes are dropped.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache command failed: {0}")]
    Command(String),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        CacheError::Unavailable(e.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Command(e.to_string())
    }
}

/// Byte-oriented key/value cache with per-entry expiration.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    /// Returns the stored payload, `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError>;

    /// Stores `value` under `key` for `ttl`, counted from now.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
impl ResolutionCache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        CacheBackend::get(self, key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        CacheBackend::set(self, key, value, ttl).await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        CacheBackend::invalidate(self, key).await
    }
}
