//! Authentication middleware for protected endpoints.
//!
//! Extracts the session token from the `Authorization: Bearer <token>`
//! header, validates signature and expiry, and injects the authenticated
//! `UserId` into request extensions for downstream handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{ApiError, AppState};

/// Validate the bearer token and inject the user id.
///
/// - **Success**: token valid → `UserId` in request extensions → next handler
/// - **Missing/invalid/expired**: `401` with code `unauthenticated`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthenticated)?;

    let claims = state
        .auth
        .verify_session_token(token)
        .map_err(|_| ApiError::unauthenticated())?;

    request.extensions_mut().insert(claims.sub);
    Ok(next.run(request).await)
}
