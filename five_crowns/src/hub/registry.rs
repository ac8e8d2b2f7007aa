//! Registry of running game actors.
//!
//! Actors are spawned on demand: the first command or subscription for a
//! game loads its row, members, and event log, replays the log into a
//! freshly seeded state, and starts the actor task. `rehydrate_active`
//! eagerly does the same for every active game at boot so reconnecting
//! clients find their games warm after a restart.

use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::actor::{GameActor, GameHandle};
use crate::db::repository::GameRepository;
use crate::db::{EventStore, StoreError};
use crate::game::GameError;
use crate::game::entities::{GameId, GameStatus, UserId};
use crate::game::events::GameEvent;
use crate::game::state::GameState;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("game not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The persisted event log does not replay cleanly.
    #[error("event log replay failed: {0}")]
    Replay(GameError),
}

pub struct GameRegistry {
    store: EventStore,
    games: Arc<dyn GameRepository>,
    inner: RwLock<HashMap<GameId, GameHandle>>,
}

impl GameRegistry {
    pub fn new(store: EventStore, games: Arc<dyn GameRepository>) -> Self {
        Self {
            store,
            games,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Get the live handle for a game, spawning (and rehydrating) its actor
    /// if necessary.
    pub async fn handle(&self, game_id: GameId) -> Result<GameHandle, RegistryError> {
        {
            let inner = self.inner.read().await;
            if let Some(handle) = inner.get(&game_id)
                && !handle.is_closed()
            {
                return Ok(handle.clone());
            }
        }

        let mut inner = self.inner.write().await;
        if let Some(handle) = inner.get(&game_id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }
        let handle = self.spawn(game_id).await?;
        inner.insert(game_id, handle.clone());
        Ok(handle)
    }

    async fn spawn(&self, game_id: GameId) -> Result<GameHandle, RegistryError> {
        let row = self
            .games
            .find(game_id)
            .await?
            .ok_or(RegistryError::NotFound)?;
        let members = self.games.members(game_id).await?;
        let user_ids: Vec<UserId> = members.iter().map(|m| m.user_id).collect();
        let stored = self.store.load(game_id).await?;
        let log: Vec<(UserId, GameEvent)> =
            stored.into_iter().map(|e| (e.actor, e.event)).collect();

        let state = GameState::replay(game_id, row.rng_seed as u64, &user_ids, &log)
            .map_err(RegistryError::Replay)?;
        info!(
            "game {game_id}: rehydrated {} event(s), status {}",
            log.len(),
            state.status()
        );

        let (actor, handle) = GameActor::new(state, self.store.clone(), self.games.clone());
        tokio::spawn(actor.run());
        Ok(handle)
    }

    /// Push a lobby roster change into the live actor, if one is running.
    pub async fn refresh_members(&self, game_id: GameId, user_ids: Vec<UserId>) {
        let handle = {
            let inner = self.inner.read().await;
            inner.get(&game_id).cloned()
        };
        if let Some(handle) = handle
            && !handle.is_closed()
            && let Err(err) = handle.sync_members(user_ids).await
        {
            error!("game {game_id}: member sync failed: {err}");
        }
    }

    /// Stop and forget a game's actor (host deleted the lobby).
    pub async fn remove(&self, game_id: GameId) {
        let handle = self.inner.write().await.remove(&game_id);
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// Spawn actors for every active game. Called once at startup.
    pub async fn rehydrate_active(&self) -> Result<usize, RegistryError> {
        let mut count = 0;
        // Walk games through the repository rather than keeping a separate
        // active list; restart is rare and the scan is cheap.
        let active = self.active_game_ids().await?;
        for game_id in active {
            match self.handle(game_id).await {
                Ok(_) => count += 1,
                Err(err) => error!("game {game_id}: rehydration failed: {err}"),
            }
        }
        Ok(count)
    }

    async fn active_game_ids(&self) -> Result<Vec<GameId>, RegistryError> {
        let rows = self.games.list_by_status(GameStatus::Active).await?;
        Ok(rows.into_iter().map(|g| g.id).collect())
    }

    /// Drain every game queue; pending commands still execute, then the
    /// actors stop.
    pub async fn shutdown(&self) {
        let handles: Vec<GameHandle> = {
            let inner = self.inner.read().await;
            inner.values().cloned().collect()
        };
        info!("draining {} game actor(s)", handles.len());
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
