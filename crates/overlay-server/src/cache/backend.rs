//! Cache backend with L1 (DashMap) and L2 (Redis) tiers.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::CacheError;
use super::pubsub::publish_invalidation;

/// Upper bound on an entry's lifetime, whatever TTL the caller asks for.
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A cached payload and the instant it stops being valid.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub expires_at: Instant,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self::from_shared(Arc::new(data), ttl)
    }

    fn from_shared(data: Arc<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl.min(MAX_ENTRY_TTL),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Two-tier cache backend: L1 (DashMap) + L2 (Redis).
///
/// - **Local**: single instance, DashMap only
/// - **Redis**: DashMap in front of a shared Redis; peers keep their L1 in sync
///   through the invalidation channel
#[derive(Clone)]
pub enum CacheBackend {
    Local(Arc<DashMap<String, CachedEntry>>),

    Redis {
        redis: Pool,
        local: Arc<DashMap<String, CachedEntry>>,
    },
}

impl CacheBackend {
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis {
            redis: redis_pool,
            local: Arc::new(DashMap::new()),
        }
    }

    /// Look a key up in L1, then L2.
    ///
    /// An L2 hit is promoted to L1 with the TTL Redis still has left, so the
    /// entry expires at the same moment on every tier.
    pub async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        let local = match self {
            CacheBackend::Local(map) => map,
            CacheBackend::Redis { local, .. } => local,
        };

        if let Some(data) = lookup_local(local, key) {
            tracing::debug!(key = %key, "cache hit (L1)");
            crate::metrics::record_cache_hit("L1");
            return Ok(Some(data));
        }

        let CacheBackend::Redis { redis, .. } = self else {
            crate::metrics::record_cache_miss();
            return Ok(None);
        };

        let mut conn = redis.get().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
        })?;

        let (data, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .get(key)
            .pttl(key)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis GET error");
            })?;

        match data {
            Some(data) => {
                tracing::debug!(key = %key, pttl_ms = pttl, "cache hit (L2)");
                crate::metrics::record_cache_hit("L2");
                let data = Arc::new(data);
                // PTTL is -1 for keys without expiry and -2 if the key vanished
                // between the two commands; only promote keys with a deadline.
                if pttl > 0 {
                    let entry = CachedEntry::from_shared(
                        Arc::clone(&data),
                        Duration::from_millis(pttl as u64),
                    );
                    local.insert(key.to_string(), entry);
                }
                Ok(Some(data))
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                crate::metrics::record_cache_miss();
                Ok(None)
            }
        }
    }

    /// Store a value with TTL.
    ///
    /// In Redis mode the L2 write is fire-and-forget.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis { redis, local } => {
                let entry = CachedEntry::new(value, ttl);
                let data_for_redis = Arc::clone(&entry.data);
                local.insert(key.to_string(), entry);

                let redis = redis.clone();
                let key = key.to_string();
                let ttl_ms = ttl.min(MAX_ENTRY_TTL).as_millis().max(1) as u64;
                tokio::spawn(async move {
                    match redis.get().await {
                        Ok(mut conn) => {
                            if let Err(e) = conn
                                .pset_ex::<_, _, ()>(&key, &*data_for_redis, ttl_ms)
                                .await
                            {
                                tracing::warn!(key = %key, error = %e, "Redis SET error");
                            } else {
                                tracing::debug!(key = %key, ttl_ms, "cache set (L1+L2)");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "Redis unavailable, L2 write dropped");
                        }
                    }
                });
            }
        }
    }

    /// Drop a key from every tier and tell peers to drop their L1 copy.
    ///
    /// The Redis `DEL` completes before this returns, so a following `get` on
    /// this instance cannot promote the old value back into L1. Only the
    /// peer notification is sent in the background.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
                tracing::debug!(key = %key, "cache invalidated (local)");
                Ok(())
            }
            CacheBackend::Redis { redis, local } => {
                local.remove(key);

                let mut conn = redis.get().await.inspect_err(|e| {
                    tracing::warn!(key = %key, error = %e, "Redis unavailable, DEL skipped");
                })?;
                conn.del::<_, ()>(key).await.inspect_err(|e| {
                    tracing::warn!(key = %key, error = %e, "Redis DEL error");
                })?;
                tracing::debug!(key = %key, "cache invalidated (L1+L2)");

                let redis = redis.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Err(e) = publish_invalidation(&redis, &key).await {
                        tracing::warn!(key = %key, error = %e, "Redis PUBLISH error");
                    }
                });
                Ok(())
            }
        }
    }

    /// Remove expired entries from L1. Returns how many were dropped.
    ///
    /// Redis expires L2 keys on its own.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.local_cache().retain(|_, entry| {
            if entry.expires_at <= now {
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Start the background L1 sweep, running every `every`.
    pub fn start_cleanup_task(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.local_cache().len(), "L1 cache cleanup completed");
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        match self {
            CacheBackend::Local(map) => CacheStats {
                l1_entries: map.len(),
                mode: "local",
            },
            CacheBackend::Redis { local, .. } => CacheStats {
                l1_entries: local.len(),
                mode: "redis",
            },
        }
    }

    /// Check if Redis is reachable (readiness probe).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis { redis, .. } => redis.get().await.is_ok(),
        }
    }

    pub fn local_cache(&self) -> &Arc<DashMap<String, CachedEntry>> {
        match self {
            CacheBackend::Local(map) => map,
            CacheBackend::Redis { local, .. } => local,
        }
    }
}

fn lookup_local(map: &DashMap<String, CachedEntry>, key: &str) -> Option<Arc<Vec<u8>>> {
    let entry = map.get(key)?;
    if entry.is_expired() {
        drop(entry);
        map.remove_if(key, |_, e| e.is_expired());
        return None;
    }
    Some(Arc::clone(&entry.data))
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub mode: &'static str,
}
