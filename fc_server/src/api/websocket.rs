//! WebSocket endpoint for realtime play.
//!
//! # Connection lifecycle
//!
//! 1. Client connects to `GET /ws` and must send `cmd.hello{token}` within
//!    a short grace window; anything else gets `evt.error{unauthenticated}`
//!    and the socket closes.
//! 2. On success the socket is bound to its user, registered for
//!    out-of-band notifications, and answered with `evt.hello`.
//! 3. `cmd.joinGame` subscribes the socket to a game's fan-out set and
//!    returns the caller's projection; game commands are serialized through
//!    that game's actor. Rules rejections come back as `evt.error` to this
//!    socket only and never mutate state.
//! 4. On disconnect the socket is unsubscribed everywhere; commands already
//!    queued still execute.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::AppState;
use crate::metrics;
use five_crowns::game::entities::{GameId, UserId};
use five_crowns::hub::{ConnId, GameCommand, GameHandle, HubError};
use five_crowns::net::messages::{ClientMessage, DrawSource, ServerMessage, codes, decode_client};

/// How long an unauthenticated socket may sit before being closed.
const HELLO_GRACE: Duration = Duration::from_secs(10);

/// Outbound queue depth per socket (replies, fan-out, notifications).
const OUTBOX_CAPACITY: usize = 64;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Unauthenticated sockets receive only `evt.error` and a close.
    let (user_id, hello_seq) = match await_hello(&state, &mut stream).await {
        Ok(done) => done,
        Err(message) => {
            let _ = send_direct(&mut sink, &message).await;
            let _ = sink.close().await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);
    let conn_id = state.connections.register(user_id, tx.clone());
    metrics::socket_connected();
    tracing::info!(user_id, conn_id, "socket authenticated");

    let _ = tx
        .send(ServerMessage::Hello {
            client_seq: hello_seq,
            user_id,
        })
        .await;

    // Single writer to the sink: everything outbound funnels through `rx`,
    // which preserves per-socket ordering.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!("failed to serialize outbound message: {err}");
                }
            }
        }
    });

    let mut joined: HashMap<GameId, GameHandle> = HashMap::new();

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let reply = match decode_client(&text) {
                    Ok(command) => {
                        handle_client_message(&state, user_id, conn_id, &tx, &mut joined, command)
                            .await
                    }
                    Err(err) => Some(ServerMessage::error(None, err.code(), err.to_string())),
                };
                if let Some(reply) = reply
                    && tx.send(reply).await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(user_id, conn_id, "socket error: {err}");
                break;
            }
        }
    }

    for handle in joined.values() {
        handle.unsubscribe(conn_id).await;
    }
    state.connections.unregister(user_id, conn_id);
    send_task.abort();
    metrics::socket_disconnected();
    tracing::info!(user_id, conn_id, "socket disconnected");
}

/// Wait for `cmd.hello` and authenticate it. Returns the error to send
/// before closing when the handshake fails.
async fn await_hello(
    state: &AppState,
    stream: &mut SplitStream<WebSocket>,
) -> Result<(UserId, u64), ServerMessage> {
    let unauthenticated =
        || ServerMessage::error(None, codes::UNAUTHENTICATED, "Authenticate with cmd.hello");

    let frame = tokio::time::timeout(HELLO_GRACE, stream.next())
        .await
        .map_err(|_| unauthenticated())?;

    let text = match frame {
        Some(Ok(Message::Text(text))) => text,
        _ => return Err(unauthenticated()),
    };

    match decode_client(&text) {
        Ok(ClientMessage::Hello { client_seq, token }) => {
            let user = state
                .auth
                .authenticate(&token)
                .await
                .map_err(|_| unauthenticated())?;
            Ok((user.id, client_seq))
        }
        Ok(_) => Err(unauthenticated()),
        Err(err) => Err(ServerMessage::error(None, err.code(), err.to_string())),
    }
}

async fn send_direct(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).expect("server messages serialize");
    sink.send(Message::Text(json.into())).await
}

/// Route one authenticated client message. Returns the direct reply for the
/// issuing socket, if any.
async fn handle_client_message(
    state: &AppState,
    user_id: UserId,
    conn_id: ConnId,
    tx: &mpsc::Sender<ServerMessage>,
    joined: &mut HashMap<GameId, GameHandle>,
    message: ClientMessage,
) -> Option<ServerMessage> {
    let client_seq = message.client_seq();
    match message {
        ClientMessage::Hello { .. } => {
            // Already authenticated; re-ack idempotently.
            Some(ServerMessage::Hello {
                client_seq,
                user_id,
            })
        }

        ClientMessage::JoinGame { game_id, .. } => {
            let handle = match state.registry.handle(game_id).await {
                Ok(handle) => handle,
                Err(err) => {
                    return Some(ServerMessage::error(
                        Some(client_seq),
                        codes::GAME_NOT_FOUND,
                        err.to_string(),
                    ));
                }
            };
            match handle.subscribe(conn_id, user_id, tx.clone()).await {
                Ok(snapshot) => {
                    joined.insert(game_id, handle);
                    Some(ServerMessage::State {
                        client_seq: Some(client_seq),
                        game: snapshot,
                    })
                }
                Err(err) => Some(hub_error(client_seq, &err)),
            }
        }

        ClientMessage::LeaveGame { game_id, .. } => {
            if let Some(handle) = joined.remove(&game_id) {
                handle.unsubscribe(conn_id).await;
            }
            None
        }

        ClientMessage::StartGame { game_id, .. } => {
            // Starting is host-triggered; the engine itself has no notion
            // of a host, so the check lives here.
            match state.games.find(game_id).await {
                Ok(Some(row)) if row.created_by != user_id => {
                    return Some(ServerMessage::error(
                        Some(client_seq),
                        "not_host",
                        "Only the host can start the game",
                    ));
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Some(ServerMessage::error(
                        Some(client_seq),
                        codes::GAME_NOT_FOUND,
                        "Game not found",
                    ));
                }
                Err(err) => {
                    return Some(ServerMessage::error(
                        Some(client_seq),
                        codes::SERVER_RETRY,
                        err.to_string(),
                    ));
                }
            }
            dispatch_command(state, user_id, conn_id, client_seq, game_id, GameCommand::Start, "start")
                .await
        }

        ClientMessage::Draw {
            game_id, source, ..
        } => {
            let (command, kind) = match source {
                DrawSource::Stock => (GameCommand::DrawStock, "draw_stock"),
                DrawSource::Discard => (GameCommand::DrawDiscard, "draw_discard"),
            };
            dispatch_command(state, user_id, conn_id, client_seq, game_id, command, kind).await
        }

        ClientMessage::LayMelds { game_id, melds, .. } => {
            dispatch_command(
                state,
                user_id,
                conn_id,
                client_seq,
                game_id,
                GameCommand::LayMelds(melds),
                "lay_melds",
            )
            .await
        }

        ClientMessage::LayOff {
            game_id,
            target_seat,
            meld_index,
            cards,
            ..
        } => {
            dispatch_command(
                state,
                user_id,
                conn_id,
                client_seq,
                game_id,
                GameCommand::LayOff {
                    target_seat,
                    meld_index,
                    cards,
                },
                "lay_off",
            )
            .await
        }

        ClientMessage::Discard { game_id, card, .. } => {
            dispatch_command(
                state,
                user_id,
                conn_id,
                client_seq,
                game_id,
                GameCommand::Discard(card),
                "discard",
            )
            .await
        }

        ClientMessage::GoOut {
            game_id,
            melds,
            discard,
            ..
        } => {
            dispatch_command(
                state,
                user_id,
                conn_id,
                client_seq,
                game_id,
                GameCommand::GoOut { melds, discard },
                "go_out",
            )
            .await
        }
    }
}

/// Send one command into its game's queue and shape the reply. The fan-out
/// to other subscribers happens inside the actor; the issuer gets the fresh
/// state here with its `clientSeq` echoed.
async fn dispatch_command(
    state: &AppState,
    user_id: UserId,
    conn_id: ConnId,
    client_seq: u64,
    game_id: GameId,
    command: GameCommand,
    kind: &'static str,
) -> Option<ServerMessage> {
    let handle = match state.registry.handle(game_id).await {
        Ok(handle) => handle,
        Err(err) => {
            metrics::command_processed(kind, false);
            return Some(ServerMessage::error(
                Some(client_seq),
                codes::GAME_NOT_FOUND,
                err.to_string(),
            ));
        }
    };

    match handle.command(user_id, Some(conn_id), command).await {
        Ok(snapshot) => {
            metrics::command_processed(kind, true);
            Some(ServerMessage::State {
                client_seq: Some(client_seq),
                game: snapshot,
            })
        }
        Err(err) => {
            metrics::command_processed(kind, false);
            Some(hub_error(client_seq, &err))
        }
    }
}

fn hub_error(client_seq: u64, err: &HubError) -> ServerMessage {
    ServerMessage::error(Some(client_seq), err.code(), err.to_string())
}
