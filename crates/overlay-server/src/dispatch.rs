//! Catch-all dispatcher: request path → route → template file.

use axum::{
    Extension,
    extract::State,
    http::{HeaderValue, Method, Uri, header},
    response::{IntoResponse, Response},
};

use crate::context::OverrideContext;
use crate::error::ApiError;
use crate::server::AppState;
use crate::templates::find_template;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Serve the template of the route matching the request path.
///
/// The route is looked up on the request's own routing table, falling back to
/// the default table, and the template on the request's search path.
pub async fn dispatch(
    State(state): State<AppState>,
    Extension(context): Extension<OverrideContext>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed {
            method: method.to_string(),
        });
    }

    let path = uri.path();
    let table = context.routing_table(&state.baseline);
    let Some(resolved) = table.resolve(path) else {
        return Err(ApiError::RouteNotFound {
            path: path.to_string(),
        });
    };
    let template = resolved.route.template.as_str();

    let Some(file) = find_template(&context.template_path, template).await else {
        tracing::debug!(
            template,
            dirs = ?context.template_path.dirs(),
            "template not found on search path"
        );
        return Err(ApiError::TemplateNotFound {
            template: template.to_string(),
        });
    };

    let body = tokio::fs::read(&file).await.map_err(|e| {
        ApiError::Internal(format!("failed to read template {template}: {e}"))
    })?;

    tracing::debug!(
        namespace = resolved.namespace.unwrap_or(""),
        template,
        file = %file.display(),
        "serving template"
    );

    let content_type = mime_guess::from_path(template)
        .first_raw()
        .filter(|m| *m != "text/html")
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        body,
    )
        .into_response())
}
