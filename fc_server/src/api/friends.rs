//! Friendship API handlers.
//!
//! Friendships are directed rows: a request is a pending row from the
//! requester, acceptance flips it and writes the reverse accepted row, so
//! every later check looks in both directions.

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::{ApiError, AppState, OK, OkResponse};
use five_crowns::db::repository::{FriendRow, FriendshipStatus};
use five_crowns::game::entities::UserId;
use five_crowns::notify::NotificationKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendAction {
    Request,
    Accept,
    Block,
}

#[derive(Debug, Deserialize)]
pub struct FriendPayload {
    pub username: String,
    pub action: FriendAction,
}

/// List the caller's friendship rows (their own direction).
pub async fn list_friends(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<FriendRow>>, ApiError> {
    let friends = state.friends.list_for(user_id).await?;
    Ok(Json(friends))
}

/// Request, accept, or block a friendship with the named user.
pub async fn modify_friendship(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(payload): Json<FriendPayload>,
) -> Result<(StatusCode, Json<OkResponse>), ApiError> {
    let target = state
        .users
        .find_by_username(&payload.username)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found", "User not found"))?;

    if target.id == user_id {
        return Err(ApiError::bad_request(
            "cannot_friend_self",
            "You cannot friend yourself",
        ));
    }

    match payload.action {
        FriendAction::Request => {
            let links = state.friends.between(user_id, target.id).await?;
            if links.iter().any(|l| l.status == FriendshipStatus::Blocked) {
                return Err(ApiError::forbidden(
                    "blocked",
                    "A block exists between these users",
                ));
            }
            if links
                .iter()
                .any(|l| l.status == FriendshipStatus::Accepted)
            {
                return Err(ApiError::conflict(
                    "already_friends",
                    "You are already friends",
                ));
            }
            let inserted = state.friends.insert_pending(user_id, target.id).await?;
            if !inserted {
                return Err(ApiError::conflict(
                    "already_requested",
                    "A request already exists",
                ));
            }
            state
                .notifications
                .notify(
                    target.id,
                    NotificationKind::FriendRequest,
                    Some(user_id),
                    None,
                )
                .await?;
            Ok((StatusCode::CREATED, Json(OK)))
        }
        FriendAction::Accept => {
            let accepted = state.friends.accept(user_id, target.id).await?;
            if !accepted {
                return Err(ApiError::not_found(
                    "no_pending_request",
                    "No pending request from that user",
                ));
            }
            state
                .notifications
                .notify(
                    target.id,
                    NotificationKind::FriendAccepted,
                    Some(user_id),
                    None,
                )
                .await?;
            Ok((StatusCode::OK, Json(OK)))
        }
        FriendAction::Block => {
            state.friends.block(user_id, target.id).await?;
            state
                .notifications
                .notify(
                    target.id,
                    NotificationKind::FriendBlocked,
                    Some(user_id),
                    None,
                )
                .await?;
            Ok((StatusCode::OK, Json(OK)))
        }
    }
}
