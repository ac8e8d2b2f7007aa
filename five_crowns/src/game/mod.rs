//! Five Crowns rules engine.
//!
//! This module provides the deterministic core of the server:
//! - Card, deck, and meld entities with the two-character wire codec
//! - Pure meld validation (runs, books, extensions, going out)
//! - The per-game state machine with seeded, replayable shuffles
//! - The event types persisted for replay

pub mod constants;
pub mod entities;
pub mod events;
pub mod melds;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use entities::{
    Card, Deck, GameId, GameSnapshot, GameStatus, Meld, MeldKind, Player, PlayerView, Rank,
    RoundNumber, SeatIndex, Suit, TurnPhase, UserId, wild_rank,
};
pub use events::{GameEvent, StoredEvent};
pub use state::GameState;

/// Fresh RNG seed for a new game. Gameplay itself never touches ambient
/// randomness; only game creation does.
pub fn random_seed() -> i64 {
    rand::random()
}

/// Errors a game command can fail with. These are returned to the issuing
/// socket only and never mutate state; [`GameError::code`] is the stable
/// machine-readable identifier used on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("that move does not fit the current phase")]
    WrongPhase,
    #[error("game is not active")]
    GameNotActive,
    #[error("you are not in this game")]
    NotInGame,
    #[error("invalid meld")]
    InvalidMeld,
    #[error("card not in hand")]
    CardNotInHand,
    #[error("those cards cannot extend that meld")]
    CannotExtendMeld,
    #[error("that hand cannot go out")]
    CannotGoOut,
    #[error("lay-offs are locked during the final turn")]
    FinalTurnPhase,
    #[error("no meld at that position")]
    MeldNotFound,
    #[error("discard pile is empty")]
    EmptyDiscard,
    #[error("stock is exhausted")]
    StockEmpty,
    #[error("game is full")]
    GameFull,
    #[error("game has already started")]
    AlreadyStarted,
    #[error("need at least 2 players")]
    NotEnoughPlayers,
}

impl GameError {
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotYourTurn => "not_your_turn",
            Self::WrongPhase => "wrong_phase",
            Self::GameNotActive => "game_not_active",
            Self::NotInGame => "not_in_game",
            Self::InvalidMeld => "invalid_meld",
            Self::CardNotInHand => "card_not_in_hand",
            Self::CannotExtendMeld => "cannot_extend_meld",
            Self::CannotGoOut => "cannot_go_out",
            Self::FinalTurnPhase => "final_turn_phase",
            Self::MeldNotFound => "meld_not_found",
            Self::EmptyDiscard => "empty_discard",
            Self::StockEmpty => "stock_empty",
            Self::GameFull => "game_full",
            Self::AlreadyStarted => "already_started",
            Self::NotEnoughPlayers => "not_enough_players",
        }
    }
}
