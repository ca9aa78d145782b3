//! Integration tests for the Redis-backed resolution cache.
//!
//! These tests start a Redis testcontainer and require Docker.

use std::sync::Arc;
use std::time::Duration;

use overlay_core::{OverrideRecord, UserId};
use overlay_db_memory::InMemoryOverrideStore;
use overlay_server::{CacheBackend, OverrideResolver, RedisConfig, create_cache_backend};
use redis::AsyncCommands;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;

async fn start_redis() -> (ContainerAsync<Redis>, String) {
    let container = Redis::default()
        .start()
        .await
        .expect("start redis container");
    let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
    (container, format!("redis://127.0.0.1:{host_port}"))
}

async fn redis_backend(url: &str) -> CacheBackend {
    let config = RedisConfig {
        enabled: true,
        url: url.to_string(),
        pool_size: 4,
        timeout_ms: 2000,
    };
    let backend = create_cache_backend(&config).await;
    assert_eq!(backend.stats().mode, "redis");
    backend
}

async fn raw_connection(url: &str) -> redis::aio::MultiplexedConnection {
    redis::Client::open(url)
        .unwrap()
        .get_multiplexed_async_connection()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fallback_to_local_when_redis_unreachable() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        pool_size: 1,
        timeout_ms: 200,
    };
    let backend = create_cache_backend(&config).await;
    assert_eq!(backend.stats().mode, "local");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_write_reaches_redis_with_ttl() {
    let (_container, url) = start_redis().await;
    let cache = redis_backend(&url).await;

    cache
        .set("tmpl_override:user_id:1", b"[]".to_vec(), Duration::from_secs(600))
        .await;
    // L2 writes are fire-and-forget.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut conn = raw_connection(&url).await;
    let stored: Option<Vec<u8>> = conn.get("tmpl_override:user_id:1").await.unwrap();
    assert_eq!(stored.as_deref(), Some(&b"[]"[..]));
    let ttl: i64 = conn.ttl("tmpl_override:user_id:1").await.unwrap();
    assert!(ttl > 590 && ttl <= 600, "unexpected ttl {ttl}");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_l2_hit_is_promoted_with_remaining_ttl() {
    let (_container, url) = start_redis().await;
    let mut conn = raw_connection(&url).await;
    let _: () = conn
        .pset_ex("tmpl_override:user_id:2", b"[]".as_slice(), 300)
        .await
        .unwrap();

    let cache = redis_backend(&url).await;
    let hit = cache.get("tmpl_override:user_id:2").await.unwrap();
    assert_eq!(hit.as_deref().map(Vec::as_slice), Some(&b"[]"[..]));
    assert_eq!(cache.stats().l1_entries, 1);

    // The promoted copy expires with the Redis key, not a fresh TTL.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(cache.get("tmpl_override:user_id:2").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_get_right_after_invalidate_misses() {
    let (_container, url) = start_redis().await;
    let cache = redis_backend(&url).await;
    let key = "tmpl_override:user_id:5";

    let mut conn = raw_connection(&url).await;
    let _: () = conn.pset_ex(key, b"[]".as_slice(), 60_000).await.unwrap();
    assert!(cache.get(key).await.unwrap().is_some());

    cache.invalidate(key).await.unwrap();
    assert!(cache.get(key).await.unwrap().is_none());
    assert!(cache.local_cache().get(key).is_none());
    let stored: Option<Vec<u8>> = conn.get(key).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_invalidation_reaches_peer_instances() {
    let (_container, url) = start_redis().await;
    let first = redis_backend(&url).await;
    let second = redis_backend(&url).await;
    // Let the listeners subscribe.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let key = "tmpl_override:user_id:3";
    first.set(key, b"[]".to_vec(), Duration::from_secs(600)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(second.get(key).await.unwrap().is_some());
    assert_eq!(second.local_cache().len(), 1);

    first.invalidate(key).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(second.local_cache().get(key).is_none());
    assert!(second.get(key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_resolver_shares_resolutions_across_instances() {
    let (_container, url) = start_redis().await;
    let store = Arc::new(InMemoryOverrideStore::with_records([OverrideRecord::new(
        "4", 1, Some("beta"), "/beta",
    )]));

    let first = OverrideResolver::new(store.clone(), Arc::new(redis_backend(&url).await));
    let second = OverrideResolver::new(store.clone(), Arc::new(redis_backend(&url).await));
    let user = UserId::new("4");

    let resolved = first.resolve(&user).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(second.resolve(&user).await.unwrap(), resolved);
    assert_eq!(store.query_count(), 1);
}
