//! Append-only persistence for game events.
//!
//! Every state-changing command is written here before the resulting state
//! is broadcast. Sequence numbers are gap-free per game: appends for one
//! game always arrive through that game's single actor, and the insert
//! derives the next `seq` atomically from the current maximum.

use log::warn;
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::{StoreError, StoreResult};
use crate::game::entities::{GameId, UserId};
use crate::game::events::{GameEvent, StoredEvent};

/// How many times an append is attempted before the game is degraded.
const APPEND_ATTEMPTS: u32 = 3;

/// Base delay between append attempts; doubles per retry.
const APPEND_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event, retrying transient database failures with bounded
    /// backoff. Returns the assigned sequence number.
    pub async fn append(
        &self,
        game_id: GameId,
        actor: UserId,
        event: &GameEvent,
    ) -> StoreResult<i64> {
        let payload = serde_json::to_value(event)?;
        let mut backoff = APPEND_BACKOFF;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_append(game_id, actor, event.kind(), &payload).await {
                Ok(seq) => return Ok(seq),
                Err(err) => {
                    warn!(
                        "game {game_id}: event append attempt {attempt}/{APPEND_ATTEMPTS} failed: {err}"
                    );
                    if attempt >= APPEND_ATTEMPTS {
                        return Err(StoreError::Database(err));
                    }
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn try_append(
        &self,
        game_id: GameId,
        actor: UserId,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO game_events (game_id, seq, type, actor_user_id, payload)
            SELECT $1, COALESCE(MAX(seq) + 1, 0), $2, $3, $4
            FROM game_events WHERE game_id = $1
            RETURNING seq
            "#,
        )
        .bind(game_id)
        .bind(kind)
        .bind(actor)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("seq"))
    }

    /// Load a game's full event log in sequence order for replay.
    pub async fn load(&self, game_id: GameId) -> StoreResult<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, seq, actor_user_id, payload, created_at
            FROM game_events
            WHERE game_id = $1
            ORDER BY seq
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row.get("payload");
            let event: GameEvent = serde_json::from_value(payload)?;
            events.push(StoredEvent {
                game_id: row.get("game_id"),
                seq: row.get("seq"),
                actor: row.get("actor_user_id"),
                event,
                created_at: row
                    .get::<chrono::NaiveDateTime, _>("created_at")
                    .and_utc(),
            });
        }
        Ok(events)
    }

    /// Delete a game's log (host deletes a lobby game).
    pub async fn purge(&self, game_id: GameId) -> StoreResult<()> {
        sqlx::query("DELETE FROM game_events WHERE game_id = $1")
            .bind(game_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
