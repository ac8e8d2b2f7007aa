//! Media-room token minting.
//!
//! The server never connects to the media plane; it only issues short-lived
//! room access tokens signed with the media service's shared secret, which
//! is a separate key from the session-signing secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use super::errors::AuthResult;
use crate::game::entities::{GameId, UserId};

/// Room tokens expire two hours after issue.
const ROOM_TOKEN_TTL_HOURS: i64 = 2;

/// Media service coordinates.
#[derive(Clone, Debug)]
pub struct MediaConfig {
    /// Base URL clients connect to (handed back alongside the token).
    pub url: String,
    /// API key identifying this server to the media service.
    pub api_key: String,
    /// Shared signing secret.
    pub api_secret: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct VideoGrant {
    room: String,
    #[serde(rename = "roomJoin")]
    room_join: bool,
    #[serde(rename = "canPublish")]
    can_publish: bool,
    #[serde(rename = "canSubscribe")]
    can_subscribe: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct RoomTokenClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
    video: VideoGrant,
}

/// Mints signed room-access tokens for a game's audio/video room.
#[derive(Clone)]
pub struct MediaTokenMinter {
    config: MediaConfig,
}

impl MediaTokenMinter {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// The URL clients pair with a minted token.
    pub fn service_url(&self) -> &str {
        &self.config.url
    }

    /// Mint a token for `user_id` to join the room of `game_id`.
    pub fn mint_room_token(
        &self,
        game_id: GameId,
        user_id: UserId,
        can_publish: bool,
        can_subscribe: bool,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = RoomTokenClaims {
            iss: self.config.api_key.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ROOM_TOKEN_TTL_HOURS)).timestamp(),
            video: VideoGrant {
                room: format!("game-{game_id}"),
                room_join: true,
                can_publish,
                can_subscribe,
            },
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn minter() -> MediaTokenMinter {
        MediaTokenMinter::new(MediaConfig {
            url: "wss://media.example.com".to_string(),
            api_key: "mediakey".to_string(),
            api_secret: "mediasecret-mediasecret-mediasecret".to_string(),
        })
    }

    #[test]
    fn room_token_carries_room_and_identity() {
        let minter = minter();
        let token = minter.mint_room_token(42, 7, true, true).unwrap();

        let mut validation = Validation::default();
        validation.validate_exp = true;
        let data = decode::<RoomTokenClaims>(
            &token,
            &DecodingKey::from_secret("mediasecret-mediasecret-mediasecret".as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.video.room, "game-42");
        assert_eq!(data.claims.sub, "7");
        assert!(data.claims.video.room_join);
        assert_eq!(
            data.claims.exp - data.claims.iat,
            ROOM_TOKEN_TTL_HOURS * 3600
        );
    }

    #[test]
    fn room_token_rejects_the_wrong_secret() {
        let minter = minter();
        let token = minter.mint_room_token(1, 2, false, true).unwrap();
        let result = decode::<RoomTokenClaims>(
            &token,
            &DecodingKey::from_secret("wrong-secret".as_bytes()),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
