use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::context::{ContextView, OverrideContext};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    pub status: &'a str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub cache: &'static str,
    pub l1_entries: usize,
    /// `None` when running without Redis.
    pub redis_available: Option<bool>,
    pub routing_overrides: bool,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness. A lost Redis degrades the cache but does not make the server
/// unready.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (cache, l1_entries, redis_available) = match &state.cache {
        Some(backend) => {
            let stats = backend.stats();
            let redis = match stats.mode {
                "redis" => Some(backend.is_redis_available().await),
                _ => None,
            };
            (stats.mode, stats.l1_entries, redis)
        }
        None => ("custom", 0, None),
    };

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            storage: state.resolver.store().backend_name(),
            cache,
            l1_entries,
            redis_available,
            routing_overrides: state.url_fragments.is_some(),
        }),
    )
}

pub async fn metrics() -> Response {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

/// Debug view of the caller's request-scoped context.
pub async fn context(Extension(context): Extension<OverrideContext>) -> Json<ContextView> {
    Json(context.view())
}
