//! Game actor message types.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::connections::ConnId;
use crate::game::GameError;
use crate::game::entities::{Card, GameSnapshot, Meld, SeatIndex, UserId};
use crate::game::events::GameEvent;
use crate::net::messages::{ServerMessage, codes};

/// A player command, as routed into a game's queue.
#[derive(Clone, Debug)]
pub enum GameCommand {
    Start,
    DrawStock,
    DrawDiscard,
    LayMelds(Vec<Meld>),
    LayOff {
        target_seat: SeatIndex,
        meld_index: usize,
        cards: Vec<Card>,
    },
    Discard(Card),
    GoOut {
        melds: Vec<Meld>,
        discard: Card,
    },
}

impl GameCommand {
    /// The event this command persists as. Command payloads and event
    /// payloads match one-to-one, which is what makes replay exact.
    pub fn to_event(&self) -> GameEvent {
        match self {
            Self::Start => GameEvent::GameStarted,
            Self::DrawStock => GameEvent::DrewFromStock,
            Self::DrawDiscard => GameEvent::DrewFromDiscard,
            Self::LayMelds(melds) => GameEvent::LaidMelds {
                melds: melds.clone(),
            },
            Self::LayOff {
                target_seat,
                meld_index,
                cards,
            } => GameEvent::LaidOff {
                target_seat: *target_seat,
                meld_index: *meld_index,
                cards: cards.clone(),
            },
            Self::Discard(card) => GameEvent::Discarded { card: *card },
            Self::GoOut { melds, discard } => GameEvent::WentOut {
                melds: melds.clone(),
                discard: *discard,
            },
        }
    }
}

/// Errors surfaced by a game actor to the issuing socket only.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HubError {
    /// A rules-engine rejection; the state did not change.
    #[error(transparent)]
    Rules(#[from] GameError),

    /// The command was valid but persisting it failed after retries; the
    /// state did not change and the client may retry.
    #[error("temporary server error, please retry")]
    ServerRetry,

    /// The game's queue is gone (deleted or shut down).
    #[error("game is not available")]
    GameClosed,
}

impl HubError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rules(err) => err.code(),
            Self::ServerRetry => codes::SERVER_RETRY,
            Self::GameClosed => codes::GAME_NOT_FOUND,
        }
    }
}

/// Messages accepted by a game actor's inbox.
#[derive(Debug)]
pub enum GameMessage {
    /// Apply a player command: validate, persist, commit, fan out.
    Command {
        actor: UserId,
        /// The issuing socket, excluded from the fan-out because it gets
        /// the state back on the reply with its `clientSeq`.
        conn_id: Option<ConnId>,
        command: GameCommand,
        reply: oneshot::Sender<Result<GameSnapshot, HubError>>,
    },

    /// Subscribe a socket to state fan-out. Replies with the current
    /// projection for that user.
    Subscribe {
        conn_id: ConnId,
        user_id: UserId,
        sender: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<Result<GameSnapshot, HubError>>,
    },

    /// Drop a socket from the fan-out set.
    Unsubscribe { conn_id: ConnId },

    /// Lobby roster changed through the REST facade; reseat and re-project.
    SyncMembers {
        user_ids: Vec<UserId>,
        reply: oneshot::Sender<Result<(), HubError>>,
    },

    /// Who must act next (used by the turn-nudge).
    CurrentActor {
        reply: oneshot::Sender<Option<UserId>>,
    },

    /// Drain and stop the actor.
    Shutdown { reply: oneshot::Sender<()> },
}
