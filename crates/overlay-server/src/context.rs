//! Request-scoped override context.
//!
//! The baseline is built once and shared. Every request gets its own
//! [`OverrideContext`] in its extensions, so one user's overrides are never
//! visible to another request and nothing has to be restored afterwards.

use std::path::PathBuf;
use std::sync::Arc;

use overlay_core::{
    FragmentProvider, OverrideDescriptor, RouteFragment, RoutingTable, TemplateSearchPath,
    UserId, compose_routing_table, compose_template_paths,
};
use serde::Serialize;

/// Process-wide defaults. Immutable after startup.
#[derive(Debug, Clone)]
pub struct Baseline {
    template_path: TemplateSearchPath,
    root: Arc<RouteFragment>,
    default_table: Arc<RoutingTable>,
}

impl Baseline {
    pub fn new(default_dir: impl Into<PathBuf>, root: Arc<RouteFragment>) -> Self {
        Self {
            template_path: TemplateSearchPath::baseline(default_dir),
            default_table: Arc::new(RoutingTable::root(Arc::clone(&root))),
            root,
        }
    }

    pub fn template_path(&self) -> &TemplateSearchPath {
        &self.template_path
    }

    pub fn root_fragment(&self) -> &Arc<RouteFragment> {
        &self.root
    }

    pub fn default_table(&self) -> &Arc<RoutingTable> {
        &self.default_table
    }
}

/// Artifacts derived from one request's resolved overrides.
#[derive(Debug, Clone)]
pub struct OverrideContext {
    /// `None` for anonymous requests.
    pub user: Option<UserId>,
    pub descriptors: Vec<OverrideDescriptor>,
    pub template_path: TemplateSearchPath,
    /// `None` keeps the request on the baseline routing table.
    pub routing: Option<Arc<RoutingTable>>,
}

impl OverrideContext {
    /// Context for a request that carries no overrides.
    pub fn baseline(user: Option<UserId>, baseline: &Baseline) -> Self {
        Self {
            user,
            descriptors: Vec::new(),
            template_path: baseline.template_path.clone(),
            routing: None,
        }
    }

    /// Compose both artifacts from `descriptors`.
    ///
    /// The routing composer only runs when `url_fragments` is set.
    pub fn compose(
        user: UserId,
        descriptors: Vec<OverrideDescriptor>,
        baseline: &Baseline,
        url_fragments: Option<&dyn FragmentProvider>,
    ) -> Self {
        let default_dir = baseline
            .template_path
            .default_dir()
            .map(PathBuf::from)
            .unwrap_or_default();
        let template_path = compose_template_paths(&descriptors, &default_dir);
        let routing = url_fragments
            .and_then(|lookup| compose_routing_table(&descriptors, lookup, &baseline.root))
            .map(Arc::new);

        Self {
            user: Some(user),
            descriptors,
            template_path,
            routing,
        }
    }

    /// The routing table this request dispatches against.
    pub fn routing_table<'a>(&'a self, baseline: &'a Baseline) -> &'a RoutingTable {
        self.routing
            .as_deref()
            .unwrap_or_else(|| baseline.default_table.as_ref())
    }

    pub fn view(&self) -> ContextView {
        ContextView {
            user: self.user.as_ref().map(|u| u.to_string()),
            template_dirs: self.template_path.dirs().to_vec(),
            routing_namespaces: self.routing.as_ref().map(|table| {
                table
                    .namespaces()
                    .into_iter()
                    .map(|ns| ns.map(str::to_string))
                    .collect()
            }),
            overrides: self.descriptors.clone(),
        }
    }
}

/// JSON shape of the context inspection endpoint.
#[derive(Debug, Serialize)]
pub struct ContextView {
    pub user: Option<String>,
    pub template_dirs: Vec<PathBuf>,
    /// `null` when the request uses the default routing table.
    pub routing_namespaces: Option<Vec<Option<String>>>,
    pub overrides: Vec<OverrideDescriptor>,
}
