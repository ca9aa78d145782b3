//! Named routing fragment providers.
//!
//! Providers are registered at startup under a dotted identifier
//! (e.g. `site.url_overrides`) and selected by configuration at request time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::routing::RouteFragment;

/// Maps override names to routing fragments.
pub trait FragmentProvider: Send + Sync {
    /// Fragment registered under `name`, if any.
    fn fragment(&self, name: &str) -> Option<Arc<RouteFragment>>;

    /// Names of every fragment this provider knows, sorted.
    fn names(&self) -> Vec<String>;
}

/// Fragment provider backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticFragmentProvider {
    fragments: BTreeMap<String, Arc<RouteFragment>>,
}

impl StaticFragmentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(mut self, name: impl Into<String>, fragment: RouteFragment) -> Self {
        self.insert(name, fragment);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, fragment: RouteFragment) {
        self.fragments.insert(name.into(), Arc::new(fragment));
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl FragmentProvider for StaticFragmentProvider {
    fn fragment(&self, name: &str) -> Option<Arc<RouteFragment>> {
        self.fragments.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }
}

/// Registry of fragment providers keyed by dotted identifier.
#[derive(Clone, Default)]
pub struct FragmentRegistry {
    providers: HashMap<String, Arc<dyn FragmentProvider>>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `id`.
    ///
    /// Fails if `id` is not a valid dotted identifier or is already taken.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        provider: Arc<dyn FragmentProvider>,
    ) -> Result<()> {
        let id = id.into();
        validate_provider_id(&id)?;
        if self.providers.contains_key(&id) {
            return Err(CoreError::ProviderConflict(id));
        }
        tracing::debug!(provider = %id, fragments = provider.names().len(), "registered fragment provider");
        self.providers.insert(id, provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn FragmentProvider>> {
        self.providers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for FragmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

/// Check that `id` is a dotted identifier: non-empty segments of
/// ASCII alphanumerics, `_` or `-`, separated by `.`.
pub fn validate_provider_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_provider_id(id))
    }
}
