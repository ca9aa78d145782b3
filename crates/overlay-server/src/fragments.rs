//! Startup wiring of routing fragments from configuration.

use std::collections::HashSet;
use std::sync::Arc;

use overlay_core::{
    CoreError, FragmentProvider, FragmentRegistry, RouteFragment, StaticFragmentProvider,
};

use crate::config::RoutingConfig;

/// Routing state built once at startup.
#[derive(Clone)]
pub struct RoutingSetup {
    pub registry: FragmentRegistry,
    /// Fragments of the root (default) routing table.
    pub root: Arc<RouteFragment>,
    /// Provider consulted for override fragments. `None` disables routing
    /// overrides entirely.
    pub url_fragments: Option<Arc<dyn FragmentProvider>>,
}

impl std::fmt::Debug for RoutingSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingSetup")
            .field("registry", &self.registry)
            .field("root_routes", &self.root.len())
            .field("routing_overrides", &self.url_fragments.is_some())
            .finish()
    }
}

/// Register the configured providers into `registry` and pick the one named
/// by `routing.url_provider`.
///
/// `registry` may already hold providers registered in code.
pub fn build_routing(
    config: &RoutingConfig,
    mut registry: FragmentRegistry,
) -> Result<RoutingSetup, CoreError> {
    let root = Arc::new(RouteFragment::new(config.root.clone())?);

    for provider in &config.providers {
        let mut fragments = StaticFragmentProvider::new();
        let mut seen = HashSet::new();
        for fragment in &provider.fragments {
            if !seen.insert(fragment.name.as_str()) {
                tracing::warn!(
                    provider = %provider.id,
                    fragment = %fragment.name,
                    "fragment defined twice, keeping the last definition"
                );
            }
            fragments.insert(fragment.name.clone(), RouteFragment::new(fragment.routes.clone())?);
        }
        registry.register(provider.id.clone(), Arc::new(fragments))?;
    }

    let url_fragments = match config.url_provider.as_deref() {
        None => {
            tracing::debug!("routing.url_provider not set, routing overrides disabled");
            None
        }
        Some(id) => match registry.get(id) {
            Some(provider) => {
                tracing::info!(provider = %id, fragments = ?provider.names(), "routing overrides enabled");
                Some(provider)
            }
            None => {
                tracing::warn!(
                    provider = %id,
                    registered = ?registry.ids(),
                    "routing.url_provider is not registered, routing overrides disabled"
                );
                None
            }
        },
    };

    Ok(RoutingSetup {
        registry,
        root,
        url_fragments,
    })
}
