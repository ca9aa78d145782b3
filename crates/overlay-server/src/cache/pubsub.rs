//! Redis Pub/Sub for cross-instance cache invalidation.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

use super::CacheError;
use super::backend::CachedEntry;

/// Channel carrying invalidated cache keys.
pub const INVALIDATION_CHANNEL: &str = "overlay:invalidate";

/// Subscribes to [`INVALIDATION_CHANNEL`] and evicts received keys from this
/// instance's L1.
///
/// ```text
/// Instance 1: invalidate("tmpl_override:user_id:42")
///   ↓
/// PUBLISH overlay:invalidate "tmpl_override:user_id:42"
///   ↓
/// Instance 2: listener removes the key from L1
/// ```
pub struct CacheInvalidationListener {
    pub redis_url: String,
    pub local_cache: Arc<DashMap<String, CachedEntry>>,
}

impl CacheInvalidationListener {
    /// Spawn the listener. It reconnects with exponential backoff when the
    /// subscription drops.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            const MAX_BACKOFF: Duration = Duration::from_secs(300);

            loop {
                match self.run().await {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Cache invalidation listener error, reconnecting..."
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }

    async fn run(&self) -> Result<(), CacheError> {
        use futures_util::StreamExt;

        // Pub/sub needs a dedicated connection, not a pooled one.
        let client = redis::Client::open(self.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(INVALIDATION_CHANNEL).await?;

        tracing::info!(channel = INVALIDATION_CHANNEL, "Subscribed to invalidation channel");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            match msg.get_payload::<String>() {
                Ok(key) => {
                    tracing::debug!(key = %key, "received cache invalidation");
                    self.local_cache.remove(&key);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse invalidation message payload");
                }
            }
        }
        Err(CacheError::Unavailable("pub/sub connection closed".into()))
    }
}

/// Publish an invalidation without touching the local tiers.
pub async fn publish_invalidation(redis: &Pool, key: &str) -> Result<(), CacheError> {
    let mut conn = redis.get().await?;
    conn.publish::<_, _, ()>(INVALIDATION_CHANNEL, key).await?;
    tracing::debug!(key = %key, "published cache invalidation");
    Ok(())
}
