//! Wire protocol types shared between the hub and the socket endpoint.

pub mod messages;

pub use messages::{ClientMessage, DecodeError, DrawSource, ServerMessage, codes, decode_client};
