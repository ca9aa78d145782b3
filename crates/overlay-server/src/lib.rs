pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fragments;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod resolver;
pub mod server;
pub mod static_assets;
pub mod templates;

pub use cache::{CacheBackend, CacheError, CachedEntry, ResolutionCache};
pub use config::{
    AppConfig, AuthConfig, CacheConfig, PostgresStorageConfig, RedisConfig, RoutingConfig,
    ServerConfig, StorageBackend, StorageConfig, TemplatesConfig,
};
pub use context::{Baseline, ContextView, OverrideContext};
pub use error::ApiError;
pub use fragments::{RoutingSetup, build_routing};
pub use observability::init_tracing;
pub use resolver::{CachedOverrides, OverrideResolver, ResolveError};
pub use server::{AppState, OverlayServer, ServerBuilder, build_app, build_router};

use overlay_storage::DynOverrideStore;

/// Create a cache backend based on configuration.
///
/// - **Redis disabled**: local-only cache (DashMap)
/// - **Redis enabled**: connects to Redis and starts the invalidation
///   listener; falls back to local-only if Redis cannot be reached
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Some(Duration::from_millis(config.timeout_ms));
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = timeout;
    pool_config.timeouts.create = timeout;
    pool_config.timeouts.recycle = timeout;
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            let backend = CacheBackend::new_redis(pool);
            cache::CacheInvalidationListener {
                redis_url: config.url.clone(),
                local_cache: backend.local_cache().clone(),
            }
            .spawn();
            backend
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            CacheBackend::new_local()
        }
    }
}

/// Create the override store selected by `storage.backend`.
pub async fn create_override_store(config: &StorageConfig) -> anyhow::Result<DynOverrideStore> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!(records = config.seed.len(), "Using in-memory override store");
            Ok(overlay_db_memory::create_override_store(config.seed.clone()))
        }
        StorageBackend::Postgres => {
            let pg = config.postgres.to_store_config();
            tracing::info!(
                url = %overlay_db_postgres::pool::mask_password(&pg.url),
                pool_size = pg.pool_size,
                "Connecting to PostgreSQL override store"
            );
            let store = overlay_db_postgres::PostgresOverrideStore::connect(&pg).await?;
            Ok(std::sync::Arc::new(store))
        }
    }
}
