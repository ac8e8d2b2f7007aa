//! Game lifecycle API handlers.
//!
//! Games are created in the lobby, filled by inviting accepted friends, and
//! started over the socket. The REST surface covers everything that does
//! not touch the rules engine: listing, membership, deletion, nudges, and
//! media-room tokens.

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, OK, OkResponse};
use five_crowns::game::constants::{MAX_PLAYERS, MIN_PLAYERS};
use five_crowns::game::entities::{GameId, GameStatus, UserId};
use five_crowns::game::random_seed;
use five_crowns::db::repository::{GameMember, GameRow};
use five_crowns::net::messages::ServerMessage;
use five_crowns::notify::NotificationKind;

#[derive(Debug, Deserialize)]
pub struct CreateGamePayload {
    pub max_players: u32,
}

#[derive(Debug, Deserialize)]
pub struct InvitePayload {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub id: GameId,
    pub status: GameStatus,
    pub created_by: UserId,
    pub max_players: i32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_user_id: Option<UserId>,
    pub members: Vec<GameMember>,
}

#[derive(Debug, Serialize)]
pub struct MediaTokenResponse {
    pub token: String,
    pub url: String,
}

impl GameResponse {
    fn from_row(row: GameRow, members: Vec<GameMember>) -> Self {
        Self {
            id: row.id,
            status: row.status,
            created_by: row.created_by,
            max_players: row.max_players,
            created_at: row.created_at,
            finished_at: row.finished_at,
            winner_user_id: row.winner_user_id,
            members,
        }
    }
}

async fn load_game(state: &AppState, game_id: GameId) -> Result<GameRow, ApiError> {
    state
        .games
        .find(game_id)
        .await?
        .ok_or_else(|| ApiError::not_found("game_not_found", "Game not found"))
}

async fn require_member(
    state: &AppState,
    game_id: GameId,
    user_id: UserId,
) -> Result<(), ApiError> {
    if state.games.is_member(game_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "not_in_game",
            "You are not a member of this game",
        ))
    }
}

/// List the caller's games, newest first.
pub async fn list_games(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<GameResponse>>, ApiError> {
    let rows = state.games.list_for_user(user_id).await?;
    let mut games = Vec::with_capacity(rows.len());
    for row in rows {
        let members = state.games.members(row.id).await?;
        games.push(GameResponse::from_row(row, members));
    }
    Ok(Json(games))
}

/// Create a lobby game with the caller as host at seat 0.
pub async fn create_game(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(payload): Json<CreateGamePayload>,
) -> Result<(StatusCode, Json<GameResponse>), ApiError> {
    let max_players = payload.max_players as usize;
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
        return Err(ApiError::bad_request(
            "invalid_max_players",
            format!("maxPlayers must be between {MIN_PLAYERS} and {MAX_PLAYERS}"),
        ));
    }

    let row = state
        .games
        .create(user_id, max_players as i32, random_seed())
        .await?;
    state.games.add_player(row.id, user_id, 0).await?;
    let members = state.games.members(row.id).await?;

    tracing::info!(game_id = row.id, host = user_id, "game created");
    Ok((StatusCode::CREATED, Json(GameResponse::from_row(row, members))))
}

/// Fetch one game the caller is a member of.
pub async fn get_game(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<GameResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;
    let members = state.games.members(game_id).await?;
    Ok(Json(GameResponse::from_row(row, members)))
}

/// Host deletes a lobby game. Members are notified and live sockets get an
/// `evt.gameDeleted` push.
pub async fn delete_game(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<OkResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    if row.created_by != user_id {
        return Err(ApiError::forbidden(
            "not_host",
            "Only the host can delete a game",
        ));
    }
    if row.status != GameStatus::Lobby {
        return Err(ApiError::conflict(
            "game_not_lobby",
            "Active games cannot be deleted",
        ));
    }

    let members = state.games.members(game_id).await?;

    state.registry.remove(game_id).await;
    state.event_store.purge(game_id).await?;
    state.games.delete(game_id).await?;

    for member in &members {
        if member.user_id != user_id
            && let Err(err) = state
                .notifications
                .notify(
                    member.user_id,
                    NotificationKind::GameDeleted,
                    Some(user_id),
                    Some(game_id),
                )
                .await
        {
            tracing::error!(game_id, member = member.user_id, "delete notification failed: {err}");
        }
        state
            .connections
            .send_to_user(member.user_id, ServerMessage::GameDeleted { game_id });
    }

    tracing::info!(game_id, host = user_id, "game deleted");
    Ok(Json(OK))
}

/// Invite an accepted friend into a lobby game. The friend is seated
/// immediately and notified.
pub async fn invite(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
    Json(payload): Json<InvitePayload>,
) -> Result<Json<OkResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;

    if row.status != GameStatus::Lobby {
        return Err(ApiError::conflict(
            "game_not_lobby",
            "Players can only be invited before the game starts",
        ));
    }

    let target = payload.user_id;
    if state
        .users
        .find_by_id(target)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("user_not_found", "User not found"));
    }

    // Acceptance writes a row in each direction; any accepted row counts.
    if !state.friends.accepted_between(user_id, target).await? {
        return Err(ApiError::forbidden(
            "not_friends",
            "You can only invite accepted friends",
        ));
    }

    let members = state.games.members(game_id).await?;
    if members.iter().any(|m| m.user_id == target) {
        return Err(ApiError::conflict(
            "already_member",
            "That user is already in the game",
        ));
    }
    if members.len() >= row.max_players as usize {
        return Err(ApiError::conflict("game_full", "The game is full"));
    }

    state
        .games
        .add_player(game_id, target, members.len())
        .await?;

    let roster: Vec<UserId> = state
        .games
        .members(game_id)
        .await?
        .iter()
        .map(|m| m.user_id)
        .collect();
    state.registry.refresh_members(game_id, roster).await;

    state
        .notifications
        .notify(
            target,
            NotificationKind::GameInvitation,
            Some(user_id),
            Some(game_id),
        )
        .await?;

    tracing::info!(game_id, inviter = user_id, target, "player invited");
    Ok(Json(OK))
}

/// A guest leaves a lobby game; remaining seats are compacted.
pub async fn leave(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<OkResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;

    if row.status != GameStatus::Lobby {
        return Err(ApiError::conflict(
            "game_not_lobby",
            "Active games cannot be left",
        ));
    }
    if row.created_by == user_id {
        return Err(ApiError::forbidden(
            "host_cannot_leave",
            "The host deletes the game instead of leaving it",
        ));
    }

    state.games.remove_player(game_id, user_id).await?;

    let roster: Vec<UserId> = state
        .games
        .members(game_id)
        .await?
        .iter()
        .map(|m| m.user_id)
        .collect();
    state.registry.refresh_members(game_id, roster).await;

    Ok(Json(OK))
}

/// Lobby nudge: a guest pokes the host to start the game.
pub async fn nudge_host(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<OkResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;

    if row.status != GameStatus::Lobby {
        return Err(ApiError::conflict(
            "game_not_lobby",
            "Lobby nudges only apply before the game starts",
        ));
    }
    if row.created_by == user_id {
        return Err(ApiError::bad_request(
            "cannot_nudge_self",
            "The host cannot nudge themselves",
        ));
    }

    state
        .notifications
        .notify(
            row.created_by,
            NotificationKind::GameNudge,
            Some(user_id),
            Some(game_id),
        )
        .await?;
    Ok(Json(OK))
}

/// Turn nudge: any member pokes whoever holds the current turn.
pub async fn nudge_player(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<OkResponse>, ApiError> {
    let row = load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;

    if row.status != GameStatus::Active {
        return Err(ApiError::conflict(
            "game_not_active",
            "Turn nudges only apply to running games",
        ));
    }

    let handle = state.registry.handle(game_id).await?;
    let current = handle.current_actor().await.ok_or_else(|| {
        ApiError::conflict("game_not_active", "No player holds the turn right now")
    })?;
    if current == user_id {
        return Err(ApiError::bad_request(
            "cannot_nudge_self",
            "It is your own turn",
        ));
    }

    state
        .notifications
        .notify(
            current,
            NotificationKind::GameNudge,
            Some(user_id),
            Some(game_id),
        )
        .await?;
    Ok(Json(OK))
}

/// Mint a media-room token for the game's audio/video room.
pub async fn livekit_token(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_id): Path<GameId>,
) -> Result<Json<MediaTokenResponse>, ApiError> {
    load_game(&state, game_id).await?;
    require_member(&state, game_id, user_id).await?;

    let token = state
        .media
        .mint_room_token(game_id, user_id, true, true)
        .map_err(ApiError::from)?;
    Ok(Json(MediaTokenResponse {
        token,
        url: state.media.service_url().to_string(),
    }))
}
