use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware,
    routing::get,
};
use overlay_core::{FragmentProvider, FragmentRegistry};
use overlay_storage::DynOverrideStore;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::cache::{CacheBackend, ResolutionCache};
use crate::config::AppConfig;
use crate::context::Baseline;
use crate::fragments::{RoutingSetup, build_routing};
use crate::resolver::OverrideResolver;
use crate::static_assets::collect_static_mounts;
use crate::{dispatch, handlers, middleware as app_middleware};

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: OverrideResolver,
    pub baseline: Arc<Baseline>,
    /// Provider of override routing fragments; `None` disables routing overrides.
    pub url_fragments: Option<Arc<dyn FragmentProvider>>,
    pub registry: Arc<FragmentRegistry>,
    /// The two-tier backend, when the resolver uses one.
    pub cache: Option<CacheBackend>,
    pub user_header: HeaderName,
    pub debug: bool,
}

impl AppState {
    pub fn new(
        cfg: &AppConfig,
        store: DynOverrideStore,
        cache: CacheBackend,
        routing: RoutingSetup,
    ) -> anyhow::Result<Self> {
        let resolver = OverrideResolver::new(store, Arc::new(cache.clone()) as Arc<dyn ResolutionCache>)
            .with_ttl(cfg.override_ttl());
        let mut state = Self::with_resolver(cfg, resolver, routing)?;
        state.cache = Some(cache);
        Ok(state)
    }

    /// State around an already configured resolver.
    pub fn with_resolver(
        cfg: &AppConfig,
        resolver: OverrideResolver,
        routing: RoutingSetup,
    ) -> anyhow::Result<Self> {
        let user_header = HeaderName::from_bytes(cfg.auth.user_header.as_bytes())
            .with_context(|| format!("invalid auth.user_header '{}'", cfg.auth.user_header))?;

        Ok(Self {
            resolver,
            baseline: Arc::new(Baseline::new(cfg.templates.default_dir(), routing.root)),
            url_fragments: routing.url_fragments,
            registry: Arc::new(routing.registry),
            cache: None,
            user_header,
            debug: cfg.server.debug,
        })
    }
}

/// Build the full application from configuration: store, cache, fragment
/// registry and router.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let store = crate::create_override_store(&cfg.storage).await?;
    let cache = crate::create_cache_backend(&cfg.redis).await;
    cache.start_cleanup_task(cfg.cache_cleanup_interval());
    let routing = build_routing(&cfg.routing, FragmentRegistry::new())?;
    let state = AppState::new(cfg, store, cache, routing)?;
    Ok(build_router(state, cfg).await)
}

/// Router over a prepared state.
///
/// Override resolution runs only for the dispatcher and the context endpoint;
/// probes and static assets never touch the store.
pub async fn build_router(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let mut scoped: Router<AppState> = Router::new();
    if state.debug {
        scoped = scoped.route("/_overlay/context", get(handlers::context));
    }
    let scoped = scoped
        .fallback(dispatch::dispatch)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::override_context,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::identify_user,
        ))
        .with_state(state.clone());

    let mut app: Router<AppState> = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics));

    if state.debug {
        let mounts =
            collect_static_mounts(state.resolver.store().as_ref(), &cfg.templates.project_path)
                .await;
        for mount in mounts {
            app = app.nest_service(&mount.prefix, ServeDir::new(&mount.root));
        }
    }

    app.fallback_service(scoped)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        user_id = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        // Outermost, so the trace span sees the id.
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

pub struct OverlayServer {
    addr: SocketAddr,
    app: Router,
}

#[derive(Default)]
pub struct ServerBuilder {
    config: AppConfig,
    addr: Option<SocketAddr>,
    store: Option<DynOverrideStore>,
    registry: FragmentRegistry,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Use `store` instead of the one configured under `[storage]`.
    pub fn with_store(mut self, store: DynOverrideStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a fragment provider in code, next to the configured ones.
    pub fn with_fragment_provider(
        mut self,
        id: impl Into<String>,
        provider: Arc<dyn FragmentProvider>,
    ) -> anyhow::Result<Self> {
        self.registry.register(id, provider)?;
        Ok(self)
    }

    pub async fn build(self) -> anyhow::Result<OverlayServer> {
        let cfg = self.config;
        let store = match self.store {
            Some(store) => store,
            None => crate::create_override_store(&cfg.storage).await?,
        };
        let cache = crate::create_cache_backend(&cfg.redis).await;
        cache.start_cleanup_task(cfg.cache_cleanup_interval());
        let routing = build_routing(&cfg.routing, self.registry)?;
        let state = AppState::new(&cfg, store, cache, routing)?;

        tracing::info!(
            storage = state.resolver.store().backend_name(),
            providers = ?state.registry.ids(),
            routing_overrides = state.url_fragments.is_some(),
            debug = state.debug,
            "application state ready"
        );

        let app = build_router(state, &cfg).await;
        Ok(OverlayServer {
            addr: self.addr.unwrap_or_else(|| cfg.addr()),
            app,
        })
    }
}

impl OverlayServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
