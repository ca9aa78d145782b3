//! Per-user override resolution: cache first, store on miss, write-through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use overlay_core::{OverrideDescriptor, UserId};
use overlay_storage::{DynOverrideStore, StorageError};
use tracing::instrument;

use crate::cache::{CacheError, ResolutionCache};

/// Default lifetime of a cached resolution.
pub const DEFAULT_OVERRIDE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("override store failed: {0}")]
    Store(#[from] StorageError),
}

/// Outcome of a cache lookup.
///
/// `Empty` is the negative-cache sentinel: the user is known to have no
/// overrides. It is never conflated with `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedOverrides {
    Absent,
    Empty,
    Populated(Vec<OverrideDescriptor>),
}

impl CachedOverrides {
    /// Classify a raw cache payload. Undecodable payloads count as absent.
    pub fn from_payload(key: &str, payload: Option<&[u8]>) -> Self {
        let Some(payload) = payload else {
            return CachedOverrides::Absent;
        };
        match OverrideDescriptor::decode_list(payload) {
            Ok(list) if list.is_empty() => CachedOverrides::Empty,
            Ok(list) => CachedOverrides::Populated(list),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding malformed cached resolution");
                CachedOverrides::Absent
            }
        }
    }
}

/// Maps a user to their override descriptors in precedence order.
#[derive(Clone)]
pub struct OverrideResolver {
    store: DynOverrideStore,
    cache: Arc<dyn ResolutionCache>,
    ttl: Duration,
}

impl OverrideResolver {
    pub fn new(store: DynOverrideStore, cache: Arc<dyn ResolutionCache>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_OVERRIDE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &DynOverrideStore {
        &self.store
    }

    /// Resolve `user`'s overrides.
    ///
    /// A cached answer, including the empty sentinel, is returned without
    /// touching the store. Otherwise the store is queried and its answer is
    /// written back for `ttl`, empty or not.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn resolve(&self, user: &UserId) -> Result<Vec<OverrideDescriptor>, ResolveError> {
        let started = Instant::now();
        let key = user.cache_key();

        match self.lookup(&key).await {
            CachedOverrides::Empty => {
                crate::metrics::record_resolution_duration("cache", started.elapsed());
                return Ok(Vec::new());
            }
            CachedOverrides::Populated(list) => {
                crate::metrics::record_resolution_duration("cache", started.elapsed());
                return Ok(list);
            }
            CachedOverrides::Absent => {}
        }

        let records = match self.store.find_overrides_for_user(user).await {
            Ok(records) => {
                crate::metrics::record_store_query(self.store.backend_name(), true);
                records
            }
            Err(e) => {
                crate::metrics::record_store_query(self.store.backend_name(), false);
                crate::metrics::record_resolution_failure();
                tracing::error!(error = %e, category = %e.category(), "override store query failed");
                return Err(e.into());
            }
        };

        let descriptors: Vec<OverrideDescriptor> =
            records.into_iter().map(OverrideDescriptor::from).collect();

        self.write_back(&key, &descriptors).await;

        tracing::debug!(count = descriptors.len(), "resolved overrides from store");
        crate::metrics::record_resolution_duration("store", started.elapsed());
        Ok(descriptors)
    }

    /// Forget the cached resolution for `user`.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn invalidate(&self, user: &UserId) -> Result<(), CacheError> {
        self.cache.invalidate(&user.cache_key()).await
    }

    async fn lookup(&self, key: &str) -> CachedOverrides {
        match self.cache.get(key).await {
            Ok(payload) => CachedOverrides::from_payload(key, payload.as_deref().map(Vec::as_slice)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                CachedOverrides::Absent
            }
        }
    }

    async fn write_back(&self, key: &str, descriptors: &[OverrideDescriptor]) {
        let payload = match OverrideDescriptor::encode_list(descriptors) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode resolution, not caching");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, payload, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

impl std::fmt::Debug for OverrideResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideResolver")
            .field("store", &self.store.backend_name())
            .field("ttl", &self.ttl)
            .finish()
    }
}
