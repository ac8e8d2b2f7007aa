//! The realtime hub: per-game actors, the actor registry, and the
//! per-user connection registry for out-of-band delivery.
//!
//! Concurrency model: a pool of socket readers feeds commands into per-game
//! single-writer queues. Within one game all transitions are sequential;
//! across games they run in parallel. No handler ever holds more than one
//! game's queue, and cross-game notifications go through
//! [`crate::notify::NotificationService`] after the current command
//! completes.

pub mod actor;
pub mod connections;
pub mod messages;
pub mod registry;

pub use actor::{GameActor, GameHandle};
pub use connections::{ConnId, ConnectionRegistry};
pub use messages::{GameCommand, GameMessage, HubError};
pub use registry::{GameRegistry, RegistryError};
