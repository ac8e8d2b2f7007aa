//! Repository traits over the persisted aggregates, with PostgreSQL
//! implementations.
//!
//! The hub and REST facade depend on these traits rather than on the pool,
//! which keeps the pure game logic testable without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{StoreError, StoreResult};
use crate::auth::models::User;
use crate::game::entities::{GameId, GameStatus, SeatIndex, UserId};
use crate::notify::{Notification, NotificationKind, NotificationStatus};

/// Read access to user accounts for search, membership display, and stats.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive username prefix search.
    async fn search(&self, query: &str, limit: i64) -> StoreResult<Vec<User>>;

    async fn stats(&self, user_id: UserId) -> StoreResult<UserStats>;
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub games_played: i64,
    pub games_won: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Blocked,
}

impl FriendshipStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Blocked => "blocked",
        }
    }

    fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// One directed friendship row.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLink {
    pub user_id: UserId,
    pub friend_id: UserId,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

/// A friendship row joined with the counterpart's username for display.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRow {
    pub friend_id: UserId,
    pub friend_username: String,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

/// Friendships are directed rows; acceptance writes one row in each
/// direction, so membership checks must look both ways.
#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    /// Insert a pending request if no row in that direction exists yet.
    /// Returns whether a row was inserted.
    async fn insert_pending(&self, from: UserId, to: UserId) -> StoreResult<bool>;

    /// Accept a pending request from `requester`: flips it to accepted and
    /// writes the reverse accepted row. Returns false when no pending
    /// request existed.
    async fn accept(&self, user: UserId, requester: UserId) -> StoreResult<bool>;

    /// Record that `user` blocked `target`.
    async fn block(&self, user: UserId, target: UserId) -> StoreResult<()>;

    /// All rows between the two users, in either direction.
    async fn between(&self, a: UserId, b: UserId) -> StoreResult<Vec<FriendLink>>;

    /// Whether an accepted row exists in either direction. Acceptance writes
    /// two rows, so this is a get-many + non-empty predicate by design.
    async fn accepted_between(&self, a: UserId, b: UserId) -> StoreResult<bool>;

    async fn list_for(&self, user: UserId) -> StoreResult<Vec<FriendRow>>;
}

/// A `games` row.
#[derive(Clone, Debug)]
pub struct GameRow {
    pub id: GameId,
    pub status: GameStatus,
    pub created_by: UserId,
    pub max_players: i32,
    pub rng_seed: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub winner_user_id: Option<UserId>,
}

/// A `game_players` row joined with the username.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMember {
    pub user_id: UserId,
    pub username: String,
    pub seat: SeatIndex,
    pub joined_at: DateTime<Utc>,
}

#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn create(
        &self,
        created_by: UserId,
        max_players: i32,
        rng_seed: i64,
    ) -> StoreResult<GameRow>;

    async fn find(&self, game_id: GameId) -> StoreResult<Option<GameRow>>;

    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<GameRow>>;

    async fn list_by_status(&self, status: GameStatus) -> StoreResult<Vec<GameRow>>;

    async fn mark_active(&self, game_id: GameId) -> StoreResult<()>;

    async fn mark_finished(&self, game_id: GameId, winner: Option<UserId>) -> StoreResult<()>;

    /// Delete the game and its membership rows.
    async fn delete(&self, game_id: GameId) -> StoreResult<()>;

    async fn add_player(
        &self,
        game_id: GameId,
        user_id: UserId,
        seat: SeatIndex,
    ) -> StoreResult<()>;

    /// Remove a player and compact the remaining seats into `[0, N)` by
    /// join order.
    async fn remove_player(&self, game_id: GameId, user_id: UserId) -> StoreResult<()>;

    /// Members in seat order.
    async fn members(&self, game_id: GameId) -> StoreResult<Vec<GameMember>>;

    async fn is_member(&self, game_id: GameId, user_id: UserId) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        from_user_id: Option<UserId>,
        game_id: Option<GameId>,
    ) -> StoreResult<Notification>;

    /// Most recent first.
    async fn list_for(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>>;

    /// Returns false when the row does not exist or belongs to someone else.
    async fn mark_read(&self, id: i64, user_id: UserId) -> StoreResult<bool>;

    async fn delete(&self, id: i64, user_id: UserId) -> StoreResult<bool>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementations
// ---------------------------------------------------------------------------

fn row_to_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, email_verified, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, email_verified, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn search(&self, query: &str, limit: i64) -> StoreResult<Vec<User>> {
        let pattern = format!("{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, email_verified, created_at
            FROM users
            WHERE username ILIKE $1
            ORDER BY username
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn stats(&self, user_id: UserId) -> StoreResult<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE g.status = 'finished') AS games_played,
                COUNT(*) FILTER (WHERE g.winner_user_id = $1) AS games_won
            FROM game_players gp
            JOIN games g ON g.id = gp.game_id
            WHERE gp.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserStats {
            games_played: row.get("games_played"),
            games_won: row.get("games_won"),
        })
    }
}

pub struct PgFriendshipRepository {
    pool: PgPool,
}

impl PgFriendshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_link(row: &PgRow) -> StoreResult<FriendLink> {
    let status: String = row.get("status");
    let status = FriendshipStatus::from_str_opt(&status).ok_or(StoreError::NotFound)?;
    Ok(FriendLink {
        user_id: row.get("user_id"),
        friend_id: row.get("friend_id"),
        status,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

#[async_trait]
impl FriendshipRepository for PgFriendshipRepository {
    async fn insert_pending(&self, from: UserId, to: UserId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO friendships (user_id, friend_id, status)
            VALUES ($1, $2, 'pending')
            ON CONFLICT (user_id, friend_id) DO NOTHING
            "#,
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn accept(&self, user: UserId, requester: UserId) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE friendships SET status = 'accepted'
            WHERE user_id = $1 AND friend_id = $2 AND status = 'pending'
            "#,
        )
        .bind(requester)
        .bind(user)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO friendships (user_id, friend_id, status)
            VALUES ($1, $2, 'accepted')
            ON CONFLICT (user_id, friend_id) DO UPDATE SET status = 'accepted'
            "#,
        )
        .bind(user)
        .bind(requester)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn block(&self, user: UserId, target: UserId) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO friendships (user_id, friend_id, status)
            VALUES ($1, $2, 'blocked')
            ON CONFLICT (user_id, friend_id) DO UPDATE SET status = 'blocked'
            "#,
        )
        .bind(user)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn between(&self, a: UserId, b: UserId) -> StoreResult<Vec<FriendLink>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, friend_id, status, created_at
            FROM friendships
            WHERE (user_id = $1 AND friend_id = $2) OR (user_id = $2 AND friend_id = $1)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_link).collect()
    }

    async fn accepted_between(&self, a: UserId, b: UserId) -> StoreResult<bool> {
        let links = self.between(a, b).await?;
        Ok(links.iter().any(|l| l.status == FriendshipStatus::Accepted))
    }

    async fn list_for(&self, user: UserId) -> StoreResult<Vec<FriendRow>> {
        let rows = sqlx::query(
            r#"
            SELECT f.friend_id, u.username, f.status, f.created_at
            FROM friendships f
            JOIN users u ON u.id = f.friend_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                let status =
                    FriendshipStatus::from_str_opt(&status).ok_or(StoreError::NotFound)?;
                Ok(FriendRow {
                    friend_id: row.get("friend_id"),
                    friend_username: row.get("username"),
                    status,
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect()
    }
}

pub struct PgGameRepository {
    pool: PgPool,
}

impl PgGameRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_game(row: &PgRow) -> StoreResult<GameRow> {
    let status: String = row.get("status");
    let status = GameStatus::from_str_opt(&status).ok_or(StoreError::NotFound)?;
    Ok(GameRow {
        id: row.get("id"),
        status,
        created_by: row.get("created_by"),
        max_players: row.get("max_players"),
        rng_seed: row.get("rng_seed"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        finished_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("finished_at")
            .map(|dt| dt.and_utc()),
        winner_user_id: row.get("winner_user_id"),
    })
}

const GAME_COLUMNS: &str =
    "id, status, created_by, max_players, rng_seed, created_at, finished_at, winner_user_id";

#[async_trait]
impl GameRepository for PgGameRepository {
    async fn create(
        &self,
        created_by: UserId,
        max_players: i32,
        rng_seed: i64,
    ) -> StoreResult<GameRow> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO games (status, created_by, max_players, rng_seed)
            VALUES ('lobby', $1, $2, $3)
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(created_by)
        .bind(max_players)
        .bind(rng_seed)
        .fetch_one(&self.pool)
        .await?;
        row_to_game(&row)
    }

    async fn find(&self, game_id: GameId) -> StoreResult<Option<GameRow>> {
        let row = sqlx::query(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1"))
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_game).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<GameRow>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT g.{}
            FROM games g
            JOIN game_players gp ON gp.game_id = g.id
            WHERE gp.user_id = $1
            ORDER BY g.created_at DESC
            "#,
            GAME_COLUMNS.replace(", ", ", g.")
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_game).collect()
    }

    async fn list_by_status(&self, status: GameStatus) -> StoreResult<Vec<GameRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE status = $1 ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_game).collect()
    }

    async fn mark_active(&self, game_id: GameId) -> StoreResult<()> {
        sqlx::query("UPDATE games SET status = 'active' WHERE id = $1")
            .bind(game_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_finished(&self, game_id: GameId, winner: Option<UserId>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE games SET status = 'finished', finished_at = NOW(), winner_user_id = $2 WHERE id = $1",
        )
        .bind(game_id)
        .bind(winner)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, game_id: GameId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM game_players WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM games WHERE id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_player(
        &self,
        game_id: GameId,
        user_id: UserId,
        seat: SeatIndex,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO game_players (game_id, user_id, seat) VALUES ($1, $2, $3)")
            .bind(game_id)
            .bind(user_id)
            .bind(seat as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_player(&self, game_id: GameId, user_id: UserId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM game_players WHERE game_id = $1 AND user_id = $2")
            .bind(game_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        // Re-number remaining seats contiguously by join order.
        sqlx::query(
            r#"
            UPDATE game_players gp
            SET seat = renumbered.new_seat
            FROM (
                SELECT user_id,
                       ROW_NUMBER() OVER (ORDER BY joined_at, user_id) - 1 AS new_seat
                FROM game_players
                WHERE game_id = $1
            ) renumbered
            WHERE gp.game_id = $1 AND gp.user_id = renumbered.user_id
            "#,
        )
        .bind(game_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn members(&self, game_id: GameId) -> StoreResult<Vec<GameMember>> {
        let rows = sqlx::query(
            r#"
            SELECT gp.user_id, u.username, gp.seat, gp.joined_at
            FROM game_players gp
            JOIN users u ON u.id = gp.user_id
            WHERE gp.game_id = $1
            ORDER BY gp.seat
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| GameMember {
                user_id: row.get("user_id"),
                username: row.get("username"),
                seat: row.get::<i32, _>("seat") as SeatIndex,
                joined_at: row.get::<chrono::NaiveDateTime, _>("joined_at").and_utc(),
            })
            .collect())
    }

    async fn is_member(&self, game_id: GameId, user_id: UserId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM game_players WHERE game_id = $1 AND user_id = $2")
            .bind(game_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &PgRow) -> StoreResult<Notification> {
    let kind: String = row.get("type");
    let kind = NotificationKind::from_str_opt(&kind).ok_or(StoreError::NotFound)?;
    let status: String = row.get("status");
    let status = match status.as_str() {
        "read" => NotificationStatus::Read,
        _ => NotificationStatus::Unread,
    };
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind,
        from_user_id: row.get("from_user_id"),
        game_id: row.get("game_id"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        status,
    })
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        from_user_id: Option<UserId>,
        game_id: Option<GameId>,
    ) -> StoreResult<Notification> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, from_user_id, game_id, status)
            VALUES ($1, $2, $3, $4, 'unread')
            RETURNING id, user_id, type, from_user_id, game_id, created_at, status
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(from_user_id)
        .bind(game_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_notification(&row)
    }

    async fn list_for(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, type, from_user_id, game_id, created_at, status
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_read(&self, id: i64, user_id: UserId) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE notifications SET status = 'read' WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64, user_id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
