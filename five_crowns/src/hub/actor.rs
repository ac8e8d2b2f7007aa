//! Game actor implementation.
//!
//! Each active game runs as one task owning the authoritative [`GameState`].
//! Commands drain from the inbox in arrival order; within a game everything
//! is sequential, across games actors run in parallel. The command path is
//! validate → persist → commit → fan out, so a snapshot is never broadcast
//! before its event is durable.

use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::connections::ConnId;
use super::messages::{GameCommand, GameMessage, HubError};
use crate::db::EventStore;
use crate::db::repository::GameRepository;
use crate::game::entities::{GameId, GameSnapshot, GameStatus, UserId};
use crate::game::state::GameState;
use crate::net::messages::ServerMessage;

const INBOX_CAPACITY: usize = 128;

/// Handle for sending messages to a game actor.
#[derive(Clone)]
pub struct GameHandle {
    sender: mpsc::Sender<GameMessage>,
    game_id: GameId,
}

impl GameHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Whether the actor behind this handle is still running.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn command(
        &self,
        actor: UserId,
        conn_id: Option<ConnId>,
        command: GameCommand,
    ) -> Result<GameSnapshot, HubError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GameMessage::Command {
                actor,
                conn_id,
                command,
                reply,
            })
            .await
            .map_err(|_| HubError::GameClosed)?;
        rx.await.map_err(|_| HubError::GameClosed)?
    }

    pub async fn subscribe(
        &self,
        conn_id: ConnId,
        user_id: UserId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<GameSnapshot, HubError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GameMessage::Subscribe {
                conn_id,
                user_id,
                sender,
                reply,
            })
            .await
            .map_err(|_| HubError::GameClosed)?;
        rx.await.map_err(|_| HubError::GameClosed)?
    }

    pub async fn unsubscribe(&self, conn_id: ConnId) {
        let _ = self.sender.send(GameMessage::Unsubscribe { conn_id }).await;
    }

    pub async fn sync_members(&self, user_ids: Vec<UserId>) -> Result<(), HubError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GameMessage::SyncMembers { user_ids, reply })
            .await
            .map_err(|_| HubError::GameClosed)?;
        rx.await.map_err(|_| HubError::GameClosed)?
    }

    pub async fn current_actor(&self) -> Option<UserId> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(GameMessage::CurrentActor { reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Drain the queue and stop the actor.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(GameMessage::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// Actor owning one game's authoritative state.
pub struct GameActor {
    game_id: GameId,
    state: GameState,
    store: EventStore,
    games: Arc<dyn GameRepository>,
    inbox: mpsc::Receiver<GameMessage>,
    subscribers: HashMap<ConnId, (UserId, mpsc::Sender<ServerMessage>)>,
    /// Set when an event append exhausted its retries; cleared by the next
    /// successful append.
    degraded: bool,
}

impl GameActor {
    pub fn new(
        state: GameState,
        store: EventStore,
        games: Arc<dyn GameRepository>,
    ) -> (Self, GameHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let game_id = state.game_id();
        let actor = Self {
            game_id,
            state,
            store,
            games,
            inbox,
            subscribers: HashMap::new(),
            degraded: false,
        };
        let handle = GameHandle { sender, game_id };
        (actor, handle)
    }

    /// Run the actor event loop until shutdown or all handles drop.
    pub async fn run(mut self) {
        info!("game {}: actor starting", self.game_id);
        while let Some(message) = self.inbox.recv().await {
            match message {
                GameMessage::Command {
                    actor,
                    conn_id,
                    command,
                    reply,
                } => {
                    let result = self.handle_command(actor, conn_id, command).await;
                    let _ = reply.send(result);
                }
                GameMessage::Subscribe {
                    conn_id,
                    user_id,
                    sender,
                    reply,
                } => {
                    let result = self.handle_subscribe(conn_id, user_id, sender);
                    let _ = reply.send(result);
                }
                GameMessage::Unsubscribe { conn_id } => {
                    self.subscribers.remove(&conn_id);
                }
                GameMessage::SyncMembers { user_ids, reply } => {
                    let result = self
                        .state
                        .set_lobby_players(&user_ids)
                        .map_err(HubError::Rules);
                    if result.is_ok() {
                        self.broadcast_except(None);
                    }
                    let _ = reply.send(result);
                }
                GameMessage::CurrentActor { reply } => {
                    let _ = reply.send(self.state.current_user());
                }
                GameMessage::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
            }
        }
        info!("game {}: actor stopped", self.game_id);
    }

    /// Validate, persist, commit, fan out.
    async fn handle_command(
        &mut self,
        actor: UserId,
        conn_id: Option<ConnId>,
        command: GameCommand,
    ) -> Result<GameSnapshot, HubError> {
        let event = command.to_event();

        // Apply to a scratch copy first so that a persistence failure after
        // validation leaves the authoritative state untouched.
        let mut next = self.state.clone();
        next.apply(actor, &event)?;

        if let Err(err) = self.store.append(self.game_id, actor, &event).await {
            error!(
                "game {}: event append exhausted retries, marking degraded: {err}",
                self.game_id
            );
            self.degraded = true;
            return Err(HubError::ServerRetry);
        }
        if self.degraded {
            info!("game {}: append recovered, clearing degraded flag", self.game_id);
            self.degraded = false;
        }

        let status_before = self.state.status();
        self.state = next;
        self.sync_game_row(status_before).await;

        self.broadcast_except(conn_id);
        Ok(self.state.snapshot_for(actor))
    }

    fn handle_subscribe(
        &mut self,
        conn_id: ConnId,
        user_id: UserId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<GameSnapshot, HubError> {
        if !self.state.is_member(user_id) {
            return Err(HubError::Rules(crate::game::GameError::NotInGame));
        }
        self.subscribers.insert(conn_id, (user_id, sender));
        Ok(self.state.snapshot_for(user_id))
    }

    /// Mirror status transitions into the `games` row.
    async fn sync_game_row(&self, status_before: GameStatus) {
        let status_after = self.state.status();
        if status_before == status_after {
            return;
        }
        let result = match status_after {
            GameStatus::Active => self.games.mark_active(self.game_id).await,
            GameStatus::Finished => {
                self.games
                    .mark_finished(self.game_id, self.state.winner())
                    .await
            }
            GameStatus::Lobby => Ok(()),
        };
        if let Err(err) = result {
            error!(
                "game {}: failed to record status {status_after}: {err}",
                self.game_id
            );
        }
    }

    /// Push a fresh per-player projection to every subscribed socket except
    /// the issuer (which receives the state on its reply). Closed sockets
    /// are pruned; a full queue drops this update for that socket only.
    fn broadcast_except(&mut self, skip: Option<ConnId>) {
        let state = &self.state;
        self.subscribers.retain(|conn_id, (user_id, sender)| {
            if Some(*conn_id) == skip {
                return true;
            }
            let message = ServerMessage::State {
                client_seq: None,
                game: state.snapshot_for(*user_id),
            };
            match sender.try_send(message) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("game {}: socket {conn_id} fan-out queue full", state.game_id());
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}
