//! # Five Crowns
//!
//! The authoritative server core for Five Crowns, a rummy-family card game
//! played with two decks across eleven rounds of escalating hand size.
//!
//! The library is the single source of truth for game state: it deals, it
//! validates every move, it advances turns, it scores, and it projects
//! per-player views for broadcast. Correctness lives in two places:
//!
//! - [`game`]: the deterministic rules engine. Pure meld validation plus a
//!   per-game state machine whose shuffles come from a persisted seed, so
//!   the event log replays to the exact live state.
//! - [`hub`]: the realtime hub. One actor task owns each active game and
//!   serializes its commands; projections fan out to subscribed sockets,
//!   and a connection registry delivers out-of-band notifications.
//!
//! Supporting modules: [`net`] (the tagged `cmd.*`/`evt.*` wire protocol),
//! [`auth`] (sessions, refresh rotation, media-room token minting), [`db`]
//! (pool, event store, repositories), and [`notify`] (persist-then-push
//! notification delivery).
//!
//! ## Example
//!
//! ```
//! use five_crowns::game::GameState;
//!
//! // A seeded two-player game, dealt for round 1.
//! let mut game = GameState::new(1, 42, &[10, 20]);
//! game.start_game().unwrap();
//! assert_eq!(game.players()[0].hand.len(), 3);
//! ```

pub mod auth;
pub mod db;
pub mod game;
pub mod hub;
pub mod net;
pub mod notify;

pub use game::{GameError, GameState};
pub use hub::{GameRegistry, HubError};
