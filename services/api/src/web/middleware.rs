//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use classroom_core::ServiceError;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Pulls the opaque auth token from the `session` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                let c = c.trim();
                c.strip_prefix("session=").map(str::to_string)
            })
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    })
    .filter(|t| !t.is_empty())
}

/// Middleware that resolves the caller behind the request's token.
///
/// If valid, inserts the `Caller` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token
    let token = extract_token(req.headers()).ok_or(ServiceError::Unauthenticated)?;

    // 2. Resolve it to a caller
    let caller = state.identity.resolve_token(&token).await.map_err(|e| {
        warn!("Rejected auth token: {:?}", e);
        ServiceError::Unauthenticated
    })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(caller);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
