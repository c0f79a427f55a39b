//! HTTP middleware for API layer.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use tracing::warn;

use crate::app::AppState;
use crate::domain::AppError;

/// Header carrying the caller's email on admin routes.
pub const ADMIN_EMAIL_HEADER: &str = "x-admin-email";

/// Admin guard.
/// Requires an `x-admin-email` header naming a configured administrator;
/// anything else is answered with 403.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let email = request
        .headers()
        .get(ADMIN_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok());

    let Some(email) = email else {
        warn!("Admin auth failed: missing x-admin-email header");
        return AppError::Authorization("admin access required".to_string()).into_response();
    };

    if !state.service.is_admin(email) {
        warn!("Admin auth failed: email is not an administrator");
        return AppError::Authorization("admin access required".to_string()).into_response();
    }

    next.run(request).await
}
