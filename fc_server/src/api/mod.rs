//! HTTP/WebSocket API for the Five Crowns server.
//!
//! The REST facade is a thin CRUD layer over games, friends, notifications,
//! and accounts; the rules engine is reachable only through the WebSocket
//! endpoint, whose commands the hub serializes per game.
//!
//! # Modules
//!
//! - [`auth`]: signup, login, e-mail verification, token refresh, password reset
//! - [`games`]: game lifecycle, invitations, nudges, media-room tokens
//! - [`friends`]: friendship requests, acceptance, blocking
//! - [`notifications`]: notification history and acknowledgement
//! - [`users`]: profile, search, stats
//! - [`websocket`]: the realtime socket (`cmd.*` / `evt.*` protocol)
//! - [`middleware`]: bearer-token authentication for protected routes

pub mod auth;
pub mod friends;
pub mod games;
pub mod middleware;
pub mod notifications;
pub mod users;
pub mod websocket;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use five_crowns::auth::{AuthError, AuthManager, MediaTokenMinter, TokenPurpose, UniqueField};
use five_crowns::db::repository::{FriendshipRepository, GameRepository, UserDirectory};
use five_crowns::db::{EventStore, StoreError};
use five_crowns::hub::{ConnectionRegistry, GameRegistry, HubError, RegistryError};
use five_crowns::notify::NotificationService;

use crate::mail::Mailer;

/// Application state shared across handlers and socket tasks. Cloned per
/// request; everything inside is `Arc`'d.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    pub media: Arc<MediaTokenMinter>,
    pub registry: Arc<GameRegistry>,
    pub users: Arc<dyn UserDirectory>,
    pub friends: Arc<dyn FriendshipRepository>,
    pub games: Arc<dyn GameRepository>,
    pub notifications: Arc<NotificationService>,
    pub connections: Arc<ConnectionRegistry>,
    pub event_store: EventStore,
    pub mailer: Arc<Mailer>,
    pub pool: PgPool,
}

/// Body for endpoints whose success carries no data.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

pub const OK: OkResponse = OkResponse { status: "ok" };

/// Uniform error payload: an HTTP status plus a stable machine-readable
/// `code` the clients switch on.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Missing or invalid session",
        )
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Taken(UniqueField::Username) => Self::conflict("username_taken", message),
            AuthError::Taken(UniqueField::Email) => Self::conflict("email_taken", message),
            AuthError::InvalidField { field, .. } => {
                let code = match field {
                    "password" => "weak_password",
                    _ => "invalid_username",
                };
                Self::bad_request(code, message)
            }
            AuthError::BadCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
            }
            AuthError::AccountGone => Self::not_found("user_not_found", message),
            AuthError::StaleSession | AuthError::Jwt(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
            }
            AuthError::BadToken(TokenPurpose::EmailVerification) => {
                Self::bad_request("invalid_verification_token", message)
            }
            AuthError::BadToken(TokenPurpose::PasswordReset) => {
                Self::bad_request("invalid_reset_token", message)
            }
            AuthError::Database(_) | AuthError::Hashing => Self::internal(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::not_found("not_found", "Not found"),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => Self::not_found("game_not_found", "Game not found"),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match &err {
            HubError::Rules(rules) => Self::bad_request(rules.code(), err.to_string()),
            HubError::ServerRetry => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "server_retry",
                err.to_string(),
            ),
            HubError::GameClosed => Self::not_found("game_not_found", err.to_string()),
        }
    }
}

/// Build the complete router.
///
/// `/auth/*` is public; everything else under `/games`, `/friends`,
/// `/notifications`, and `/users` requires a bearer session token. The
/// WebSocket endpoint authenticates itself via `cmd.hello`.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password-reset", post(auth::password_reset_request))
        .route(
            "/auth/password-reset/confirm",
            post(auth::password_reset_confirm),
        );

    let protected_routes = Router::new()
        .route("/games", get(games::list_games).post(games::create_game))
        .route(
            "/games/{game_id}",
            get(games::get_game).delete(games::delete_game),
        )
        .route("/games/{game_id}/invite", post(games::invite))
        .route("/games/{game_id}/leave", post(games::leave))
        .route("/games/{game_id}/nudge", post(games::nudge_host))
        .route("/games/{game_id}/nudge-player", post(games::nudge_player))
        .route("/games/{game_id}/livekit-token", post(games::livekit_token))
        .route(
            "/friends",
            get(friends::list_friends).post(friends::modify_friendship),
        )
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{id}/read",
            post(notifications::mark_notification_read),
        )
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/users/me", get(users::me))
        .route("/users/me/stats", get(users::my_stats))
        .route("/users/search", get(users::search))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
