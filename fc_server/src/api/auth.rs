//! Authentication API handlers.
//!
//! Public endpoints for account lifecycle: signup with e-mail verification,
//! login, session refresh, logout, and password reset. All responses are
//! JSON; failures carry a stable machine-readable `code`.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, OK, OkResponse};
use five_crowns::auth::UserId;

#[derive(Debug, Deserialize)]
pub struct SignupPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmPayload {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub session_token: String,
    pub refresh_token: String,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
}

/// Create an account and queue the verification e-mail.
///
/// Returns `201 Created` with the new user. The account can log in before
/// verifying, but clients surface the unverified state.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let (user, verification_token) = state
        .auth
        .signup(&payload.username, &payload.email, &payload.password)
        .await?;

    state
        .mailer
        .send_verification(&user.email, &verification_token);

    tracing::info!(user_id = user.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user_id: user.id,
            username: user.username,
            email: user.email,
            email_verified: user.email_verified,
        }),
    ))
}

/// Authenticate and mint session tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, tokens) = state.auth.login(&payload.username, &payload.password).await?;
    Ok(Json(AuthResponse {
        session_token: tokens.session_token,
        refresh_token: tokens.refresh_token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Confirm an e-mail address.
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPayload>,
) -> Result<Json<OkResponse>, ApiError> {
    state.auth.verify_email(&payload.token).await?;
    Ok(Json(OK))
}

/// Rotate a refresh token into fresh session tokens.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let tokens = state.auth.refresh(&payload.refresh_token).await?;
    let claims = state.auth.verify_session_token(&tokens.session_token)?;
    let user = state
        .auth
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found", "User not found"))?;
    Ok(Json(AuthResponse {
        session_token: tokens.session_token,
        refresh_token: tokens.refresh_token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Invalidate a refresh token.
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<OkResponse>, ApiError> {
    state.auth.logout(&payload.refresh_token).await?;
    Ok(Json(OK))
}

/// Request a password reset e-mail.
///
/// Responds `200` whether or not the address exists, so the endpoint does
/// not reveal which accounts are registered.
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetPayload>,
) -> Result<Json<OkResponse>, ApiError> {
    if let Some((user, token)) = state.auth.request_password_reset(&payload.email).await? {
        state.mailer.send_password_reset(&user.email, &token);
    }
    Ok(Json(OK))
}

/// Set a new password using an e-mailed reset token.
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmPayload>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .auth
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(OK))
}
