//! User profile API handlers.

use axum::{
    Json,
    extract::{Extension, Query, State},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use five_crowns::db::repository::UserStats;
use five_crowns::game::entities::UserId;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub user_id: UserId,
    pub username: String,
}

const SEARCH_LIMIT: i64 = 20;

/// The caller's own profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found", "User not found"))?;
    Ok(Json(ProfileResponse {
        user_id: user.id,
        username: user.username,
        email: user.email,
        email_verified: user.email_verified,
    }))
}

/// Username prefix search (for sending friend requests).
pub async fn search(
    State(state): State<AppState>,
    Extension(_user_id): Extension<UserId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::bad_request(
            "invalid_query",
            "Search query must not be empty",
        ));
    }
    let users = state.users.search(q, SEARCH_LIMIT).await?;
    Ok(Json(
        users
            .into_iter()
            .map(|u| SearchResult {
                user_id: u.id,
                username: u.username,
            })
            .collect(),
    ))
}

/// Finished-game counts for the caller.
pub async fn my_stats(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = state.users.stats(user_id).await?;
    Ok(Json(stats))
}
