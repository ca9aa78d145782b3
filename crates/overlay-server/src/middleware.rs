use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use overlay_core::UserId;
use uuid::Uuid;

use crate::context::OverrideContext;
use crate::error::ApiError;
use crate::server::AppState;

/// Identity of the caller, as asserted by the trusted upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

// Ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = match req.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => HeaderValue::try_from(Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    // Downstream spans read it from the extensions.
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// Reads the user id from the configured identity header.
///
/// Missing, empty or non-UTF-8 values leave the request anonymous.
pub async fn identify_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let user = req
        .headers()
        .get(&state.user_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::new);

    if let Some(user) = user {
        tracing::Span::current().record("user_id", tracing::field::display(&user));
        req.extensions_mut().insert(AuthenticatedUser(user));
    }

    next.run(req).await
}

/// Resolves the caller's overrides and attaches a fresh [`OverrideContext`]
/// to the request.
///
/// Anonymous requests get the baseline context without touching the cache or
/// the store. A store failure ends the request with 503.
pub async fn override_context(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.clone());

    let context = match user {
        None => OverrideContext::baseline(None, &state.baseline),
        Some(user) => match state.resolver.resolve(&user).await {
            Ok(descriptors) if descriptors.is_empty() => {
                OverrideContext::baseline(Some(user), &state.baseline)
            }
            Ok(descriptors) => OverrideContext::compose(
                user,
                descriptors,
                &state.baseline,
                state.url_fragments.as_deref(),
            ),
            Err(e) => return ApiError::from(e).into_response(),
        },
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}
