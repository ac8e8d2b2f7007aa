//! Wire protocol for the realtime socket.
//!
//! Messages are JSON objects tagged by `type`: client requests use `cmd.*`
//! kinds and carry a client-assigned `clientSeq` echoed back on the direct
//! reply; server pushes use `evt.*` kinds. Unknown `type` values are
//! rejected with `evt.error{code: unknown_type}` rather than a bare parse
//! error.

use serde::{Deserialize, Serialize};

use crate::game::entities::{Card, GameId, GameSnapshot, Meld, SeatIndex, UserId};
use crate::notify::Notification;

/// Stable machine codes for hub-level errors (the rules engine's own codes
/// come from [`crate::game::GameError::code`]).
pub mod codes {
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const UNKNOWN_TYPE: &str = "unknown_type";
    pub const MALFORMED: &str = "malformed";
    pub const SERVER_RETRY: &str = "server_retry";
    pub const GAME_NOT_FOUND: &str = "game_not_found";
}

/// Which pile a `cmd.draw` takes from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    Stock,
    Discard,
}

/// Client requests.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "cmd.hello")]
    Hello { client_seq: u64, token: String },
    #[serde(rename = "cmd.joinGame")]
    JoinGame { client_seq: u64, game_id: GameId },
    #[serde(rename = "cmd.leaveGame")]
    LeaveGame { client_seq: u64, game_id: GameId },
    #[serde(rename = "cmd.startGame")]
    StartGame { client_seq: u64, game_id: GameId },
    #[serde(rename = "cmd.draw")]
    Draw {
        client_seq: u64,
        game_id: GameId,
        source: DrawSource,
    },
    #[serde(rename = "cmd.layMelds")]
    LayMelds {
        client_seq: u64,
        game_id: GameId,
        melds: Vec<Meld>,
    },
    #[serde(rename = "cmd.layOff")]
    LayOff {
        client_seq: u64,
        game_id: GameId,
        target_seat: SeatIndex,
        meld_index: usize,
        cards: Vec<Card>,
    },
    #[serde(rename = "cmd.discard")]
    Discard {
        client_seq: u64,
        game_id: GameId,
        card: Card,
    },
    #[serde(rename = "cmd.goOut")]
    GoOut {
        client_seq: u64,
        game_id: GameId,
        melds: Vec<Meld>,
        discard: Card,
    },
}

impl ClientMessage {
    pub fn client_seq(&self) -> u64 {
        match self {
            Self::Hello { client_seq, .. }
            | Self::JoinGame { client_seq, .. }
            | Self::LeaveGame { client_seq, .. }
            | Self::StartGame { client_seq, .. }
            | Self::Draw { client_seq, .. }
            | Self::LayMelds { client_seq, .. }
            | Self::LayOff { client_seq, .. }
            | Self::Discard { client_seq, .. }
            | Self::GoOut { client_seq, .. } => *client_seq,
        }
    }
}

/// Server pushes and replies.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "evt.hello")]
    Hello { client_seq: u64, user_id: UserId },
    #[serde(rename = "evt.state")]
    State {
        #[serde(skip_serializing_if = "Option::is_none")]
        client_seq: Option<u64>,
        game: GameSnapshot,
    },
    #[serde(rename = "evt.error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        client_seq: Option<u64>,
        code: String,
        message: String,
    },
    #[serde(rename = "evt.notification")]
    Notification { notification: Notification },
    #[serde(rename = "evt.gameDeleted")]
    GameDeleted { game_id: GameId },
}

impl ServerMessage {
    pub fn error(client_seq: Option<u64>, code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            client_seq,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Why an inbound frame could not become a [`ClientMessage`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => codes::UNKNOWN_TYPE,
            Self::Malformed(_) => codes::MALFORMED,
        }
    }
}

const KNOWN_TYPES: [&str; 9] = [
    "cmd.hello",
    "cmd.joinGame",
    "cmd.leaveGame",
    "cmd.startGame",
    "cmd.draw",
    "cmd.layMelds",
    "cmd.layOff",
    "cmd.discard",
    "cmd.goOut",
];

/// Decode an inbound text frame, distinguishing unknown `type` values from
/// otherwise malformed payloads.
pub fn decode_client(text: &str) -> Result<ClientMessage, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| DecodeError::Malformed("missing `type`".to_string()))?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::MeldKind;

    #[test]
    fn commands_parse_with_camel_case_fields() {
        let msg =
            decode_client(r#"{"type":"cmd.draw","clientSeq":3,"gameId":9,"source":"discard"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Draw {
                client_seq: 3,
                game_id: 9,
                source: DrawSource::Discard,
            }
        );
        assert_eq!(msg.client_seq(), 3);
    }

    #[test]
    fn lay_melds_carries_card_codes() {
        let msg = decode_client(
            r#"{"type":"cmd.layMelds","clientSeq":1,"gameId":4,
                "melds":[{"kind":"run","cards":["H4","H5","H6"]}]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::LayMelds { melds, .. } => {
                assert_eq!(melds.len(), 1);
                assert_eq!(melds[0].kind, MeldKind::Run);
                assert_eq!(melds[0].cards[0].to_string(), "H4");
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn unknown_types_are_called_out() {
        let err = decode_client(r#"{"type":"cmd.cheat","clientSeq":1}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("cmd.cheat".to_string()));
        assert_eq!(err.code(), codes::UNKNOWN_TYPE);
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = decode_client(r#"{"type":"cmd.joinGame"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        let err = decode_client("not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn server_events_use_their_tag() {
        let json = serde_json::to_string(&ServerMessage::GameDeleted { game_id: 12 }).unwrap();
        assert_eq!(json, r#"{"type":"evt.gameDeleted","gameId":12}"#);

        let err = ServerMessage::error(Some(8), codes::UNKNOWN_TYPE, "nope");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""type":"evt.error""#));
        assert!(json.contains(r#""clientSeq":8"#));
        assert!(json.contains(r#""code":"unknown_type""#));
    }
}
