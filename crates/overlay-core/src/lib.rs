//! # overlay-core
//!
//! Per-user override model for the Overlay server.
//!
//! An override record ties a user to a template directory and, optionally, to a
//! named routing fragment. This crate holds the data model and the two pure
//! composers that turn a user's resolved overrides into request-scoped
//! artifacts:
//!
//! - [`compose_template_paths`]: override directories first, default last
//! - [`compose_routing_table`]: override fragments first, root fragment last
//!
//! Resolution (cache + store) lives in `overlay-server`; storage traits live in
//! `overlay-storage`.

pub mod error;
pub mod registry;
pub mod routing;
pub mod template_path;
pub mod types;

pub use error::{CoreError, Result};
pub use registry::{FragmentProvider, FragmentRegistry, StaticFragmentProvider, validate_provider_id};
pub use routing::{Inclusion, ResolvedRoute, Route, RouteFragment, RoutingTable, compose_routing_table};
pub use template_path::{TemplateSearchPath, compose_template_paths};
pub use types::{
    CACHE_KEY_PREFIX, OverrideDescriptor, OverrideRecord, UserId, precedence_cmp,
    sort_by_precedence,
};
