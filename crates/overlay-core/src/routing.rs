//! Routing fragments, routing tables and the per-user routing table composer.
//!
//! A [`RoutingTable`] is an ordered list of fragment inclusions. Dispatch scans
//! the inclusions front to back and the first fragment that knows the request
//! path wins, so override fragments placed ahead of the root fragment shadow it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::registry::FragmentProvider;
use crate::types::OverrideDescriptor;

/// A single path-to-template mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Exact request path, starting with `/`.
    pub path: String,
    /// Optional name used for reverse lookups.
    #[serde(default)]
    pub name: Option<String>,
    /// Template rendered for this route, relative to the template search path.
    pub template: String,
}

impl Route {
    pub fn new(path: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            template: template.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A named, includable unit of URL-to-template mapping.
#[derive(Debug, Clone, Default)]
pub struct RouteFragment {
    routes: Vec<Route>,
    by_path: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl RouteFragment {
    /// Build a fragment, rejecting malformed or duplicate routes.
    pub fn new(routes: Vec<Route>) -> Result<Self> {
        let mut by_path = HashMap::with_capacity(routes.len());
        let mut by_name = HashMap::new();

        for (idx, route) in routes.iter().enumerate() {
            if !route.path.starts_with('/') {
                return Err(CoreError::invalid_route(
                    &route.path,
                    "path must start with '/'",
                ));
            }
            if route.template.is_empty() {
                return Err(CoreError::invalid_route(
                    &route.path,
                    "template must not be empty",
                ));
            }
            if by_path.insert(route.path.clone(), idx).is_some() {
                return Err(CoreError::duplicate_route(&route.path));
            }
            if let Some(name) = &route.name
                && by_name.insert(name.clone(), idx).is_some()
            {
                return Err(CoreError::duplicate_route_name(name));
            }
        }

        Ok(Self {
            routes,
            by_path,
            by_name,
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route serving `path`.
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        self.by_path.get(path).map(|&idx| &self.routes[idx])
    }

    /// Find a route by its name.
    pub fn named(&self, name: &str) -> Option<&Route> {
        self.by_name.get(name).map(|&idx| &self.routes[idx])
    }
}

/// One entry of a routing table.
#[derive(Debug, Clone)]
pub struct Inclusion {
    /// Namespace used for reverse lookups; `None` for the root fragment.
    pub namespace: Option<String>,
    pub fragment: Arc<RouteFragment>,
}

/// A route matched by [`RoutingTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub namespace: Option<&'a str>,
    pub route: &'a Route,
}

/// Ordered sequence of fragment inclusions.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    inclusions: Vec<Inclusion>,
}

impl RoutingTable {
    /// The process default table: only the root fragment, unnamespaced.
    pub fn root(fragment: Arc<RouteFragment>) -> Self {
        Self {
            inclusions: vec![Inclusion {
                namespace: None,
                fragment,
            }],
        }
    }

    pub fn inclusions(&self) -> &[Inclusion] {
        &self.inclusions
    }

    /// Namespaces in evaluation order (`None` for unnamespaced inclusions).
    pub fn namespaces(&self) -> Vec<Option<&str>> {
        self.inclusions
            .iter()
            .map(|inc| inc.namespace.as_deref())
            .collect()
    }

    /// First route matching `path`, scanning inclusions in order.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        self.inclusions.iter().find_map(|inc| {
            inc.fragment.lookup(path).map(|route| ResolvedRoute {
                namespace: inc.namespace.as_deref(),
                route,
            })
        })
    }

    /// Path of the route named `qualified`.
    ///
    /// `"ns:name"` looks inside the inclusion with namespace `ns`; a bare
    /// `"name"` only searches unnamespaced inclusions.
    pub fn reverse(&self, qualified: &str) -> Option<&str> {
        let (namespace, name) = match qualified.rsplit_once(':') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, qualified),
        };

        self.inclusions
            .iter()
            .filter(|inc| inc.namespace.as_deref() == namespace)
            .find_map(|inc| inc.fragment.named(name))
            .map(|route| route.path.as_str())
    }
}

/// Build the request's routing table from the user's overrides.
///
/// Each descriptor whose `override_name` names a fragment known to `lookup`
/// contributes that fragment, namespaced by the override name, in resolver
/// order. The root fragment is appended last. Returns `None` when no
/// descriptor contributed, leaving the request on the process default table.
pub fn compose_routing_table(
    descriptors: &[OverrideDescriptor],
    lookup: &dyn FragmentProvider,
    default_table: &Arc<RouteFragment>,
) -> Option<RoutingTable> {
    let mut inclusions: Vec<Inclusion> = descriptors
        .iter()
        .filter_map(|d| {
            let name = d.override_name.as_deref()?;
            let Some(fragment) = lookup.fragment(name) else {
                tracing::trace!(override_name = %name, "no routing fragment registered");
                return None;
            };
            Some(Inclusion {
                namespace: Some(name.to_string()),
                fragment,
            })
        })
        .collect();

    if inclusions.is_empty() {
        return None;
    }

    inclusions.push(Inclusion {
        namespace: None,
        fragment: Arc::clone(default_table),
    });

    Some(RoutingTable { inclusions })
}
