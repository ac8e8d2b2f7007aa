//! Notification history API handlers.
//!
//! Rows are written by [`five_crowns::notify::NotificationService`] at
//! event time; these endpoints let late-connecting clients catch up and
//! acknowledge.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use serde::Deserialize;

use super::{ApiError, AppState, OK, OkResponse};
use five_crowns::game::entities::UserId;
use five_crowns::notify::Notification;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let rows = state.notifications.list_for(user_id, limit).await?;
    Ok(Json(rows))
}

/// Mark one of the caller's notifications as read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if !state.notifications.mark_read(id, user_id).await? {
        return Err(ApiError::not_found(
            "notification_not_found",
            "Notification not found",
        ));
    }
    Ok(Json(OK))
}

/// Delete one of the caller's notifications.
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if !state.notifications.delete(id, user_id).await? {
        return Err(ApiError::not_found(
            "notification_not_found",
            "Notification not found",
        ));
    }
    Ok(Json(OK))
}
