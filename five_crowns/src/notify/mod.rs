//! Out-of-band user notifications.
//!
//! Notifications target a user, not a game: invites, nudges, and friendship
//! events reach a user on every live socket no matter what they are looking
//! at. Delivery is persist-first: a row is always written so that a client
//! connecting later can fetch history, then every currently live socket
//! gets a best-effort push. Notifications never pass through a game's
//! command queue.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::db::StoreResult;
use crate::db::repository::NotificationRepository;
use crate::game::entities::{GameId, UserId};
use crate::hub::connections::ConnectionRegistry;
use crate::net::messages::ServerMessage;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "gameInvitation")]
    GameInvitation,
    #[serde(rename = "gameDeleted")]
    GameDeleted,
    #[serde(rename = "friendRequest")]
    FriendRequest,
    #[serde(rename = "friendAccepted")]
    FriendAccepted,
    #[serde(rename = "friendBlocked")]
    FriendBlocked,
    #[serde(rename = "gameNudge")]
    GameNudge,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GameInvitation => "gameInvitation",
            Self::GameDeleted => "gameDeleted",
            Self::FriendRequest => "friendRequest",
            Self::FriendAccepted => "friendAccepted",
            Self::FriendBlocked => "friendBlocked",
            Self::GameNudge => "gameNudge",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "gameInvitation" => Some(Self::GameInvitation),
            "gameDeleted" => Some(Self::GameDeleted),
            "friendRequest" => Some(Self::FriendRequest),
            "friendAccepted" => Some(Self::FriendAccepted),
            "friendBlocked" => Some(Self::FriendBlocked),
            "gameNudge" => Some(Self::GameNudge),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }
}

/// A persisted notification row as shown to its owner.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    pub created_at: DateTime<Utc>,
    pub status: NotificationStatus,
}

/// Persists notifications and pushes them to live sockets.
#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    connections: Arc<ConnectionRegistry>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        connections: Arc<ConnectionRegistry>,
    ) -> Self {
        Self { repo, connections }
    }

    /// Persist a notification, then push it to every live socket of the
    /// target user.
    pub async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        from_user_id: Option<UserId>,
        game_id: Option<GameId>,
    ) -> StoreResult<Notification> {
        let notification = self.repo.create(user_id, kind, from_user_id, game_id).await?;
        let delivered = self.connections.send_to_user(
            user_id,
            ServerMessage::Notification {
                notification: notification.clone(),
            },
        );
        debug!(
            "notified user {user_id} of {kind} ({delivered} live socket(s))"
        );
        Ok(notification)
    }

    /// The user's notification history, newest first.
    pub async fn list_for(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>> {
        self.repo.list_for(user_id, limit).await
    }

    /// Acknowledge a notification. False when it is not the caller's.
    pub async fn mark_read(&self, id: i64, user_id: UserId) -> StoreResult<bool> {
        self.repo.mark_read(id, user_id).await
    }

    pub async fn delete(&self, id: i64, user_id: UserId) -> StoreResult<bool> {
        self.repo.delete(id, user_id).await
    }
}
