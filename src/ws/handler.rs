//! WebSocket upgrade handler and per-session packet dispatch

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::catalog::CardKind;
use crate::matchmaking::{JoinOutcome, MatchmakingError, QueuedSession};
use crate::store::{Profile, StoreError};
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ErrorCode, ServerMsg};
use crate::ws::session::SessionIdentity;

/// Per-session outbound queue depth
pub const OUTBOUND_CAPACITY: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_CAPACITY);
    state.sessions.register(session_id, outbound_tx.clone());

    let writer_handle = tokio::spawn(write_loop(session_id, ws_sink, outbound_rx));

    let _ = outbound_tx
        .send(ServerMsg::Welcome {
            session_id,
            server_time: unix_millis(),
        })
        .await;

    read_loop(session_id, ws_stream, &outbound_tx, &state).await;

    // Cleanup on disconnect
    state.matchmaking.disconnect(session_id).await;
    state.sessions.remove(&session_id);
    writer_handle.abort();

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Outbound queue -> socket
async fn write_loop(
    session_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to serialize message");
                continue;
            }
        };
        if let Err(e) = ws_sink.send(Message::Text(json)).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Socket -> packet dispatch, until the client goes away
async fn read_loop(
    session_id: Uuid,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    outbound: &mpsc::Sender<ServerMsg>,
    state: &AppState,
) {
    let rate_limiter = SessionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited client packet");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(state, session_id, outbound, msg).await,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client packet");
                        reply(
                            outbound,
                            ServerMsg::error(ErrorCode::MalformedPacket, "Invalid packet format"),
                        );
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Queue a reply without waiting on a slow client
fn reply(outbound: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    if outbound.try_send(msg).is_err() {
        debug!("Reply dropped, outbound queue unavailable");
    }
}

fn auth_failure(outbound: &mpsc::Sender<ServerMsg>, message: String) {
    reply(
        outbound,
        ServerMsg::AuthResponse {
            success: false,
            player_id: None,
            message: message.clone(),
            player_stats: None,
        },
    );
    reply(outbound, ServerMsg::error(ErrorCode::InvalidCredentials, message));
}

fn store_failure(outbound: &mpsc::Sender<ServerMsg>, fallback: ErrorCode, e: &StoreError) {
    let code = if e.is_unavailable() {
        ErrorCode::PersistenceUnavailable
    } else {
        fallback
    };
    reply(outbound, ServerMsg::error(code, e.to_string()));
}

/// Route one parsed packet
pub async fn handle_client_msg(
    state: &AppState,
    session_id: Uuid,
    outbound: &mpsc::Sender<ServerMsg>,
    msg: ClientMsg,
) {
    match msg {
        ClientMsg::Login { username, .. } => {
            let result = state.profile_store.login(username.trim()).await;
            complete_auth(state, session_id, outbound, result, "Login successful");
        }

        ClientMsg::Register { username, .. } => {
            let result = state.profile_store.register(username.trim()).await;
            complete_auth(state, session_id, outbound, result, "Registration successful");
        }

        ClientMsg::FindMatch { selected_deck } => {
            let Some(identity) = state.sessions.identity(&session_id) else {
                reply(outbound, ServerMsg::error(ErrorCode::NotAuthenticated, "Not authenticated"));
                return;
            };
            let queued = QueuedSession::new(
                session_id,
                identity.username,
                Some(identity.profile_id),
                selected_deck,
                outbound.clone(),
            );
            match state.matchmaking.join(queued).await {
                Ok(JoinOutcome::Queued {
                    position,
                    queue_size,
                }) => reply(
                    outbound,
                    ServerMsg::MatchmakingStatus {
                        in_queue: true,
                        queue_position: position,
                        queue_size,
                    },
                ),
                Ok(JoinOutcome::Matched { .. }) => {}
                Err(MatchmakingError::AlreadyInMatch) => {
                    reply(outbound, ServerMsg::error(ErrorCode::AlreadyInGame, "Already in a game"))
                }
            }
        }

        ClientMsg::CancelMatch => {
            state.matchmaking.cancel(session_id).await;
            reply(
                outbound,
                ServerMsg::MatchmakingStatus {
                    in_queue: false,
                    queue_position: 0,
                    queue_size: state.matchmaking.queue_size().await,
                },
            );
        }

        ClientMsg::Command(command) => {
            if !state.matchmaking.route_command(session_id, command).await {
                reply(outbound, ServerMsg::error(ErrorCode::NotInGame, "Not in a game"));
            }
        }

        ClientMsg::LeaveGame { surrender } => {
            let left = state.matchmaking.leave_match(session_id, surrender).await;
            let message = match (left, surrender) {
                (false, _) => "Not in a game",
                (true, true) => "You surrendered",
                (true, false) => "Left game",
            };
            reply(
                outbound,
                ServerMsg::GameLeft {
                    success: true,
                    message: message.to_string(),
                },
            );
        }

        ClientMsg::GetStats => {
            let Some(identity) = state.sessions.identity(&session_id) else {
                reply(outbound, ServerMsg::error(ErrorCode::NotAuthenticated, "Not authenticated"));
                return;
            };
            match state.profile_store.get_profile(identity.profile_id).await {
                Ok(profile) => reply(
                    outbound,
                    ServerMsg::StatsResponse {
                        stats: profile.map(|p| p.stats).unwrap_or_default(),
                    },
                ),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to load stats");
                    store_failure(outbound, ErrorCode::PersistenceUnavailable, &e);
                }
            }
        }

        ClientMsg::GetAllCards => reply(
            outbound,
            ServerMsg::AllCardsResponse {
                cards: CardKind::catalog(),
            },
        ),

        ClientMsg::SaveDeck {
            deck_name,
            card_types,
        } => {
            let Some(identity) = state.sessions.identity(&session_id) else {
                reply(outbound, ServerMsg::error(ErrorCode::NotAuthenticated, "Not authenticated"));
                return;
            };
            if let Err(e) = state
                .deck_store
                .save_deck(identity.profile_id, &deck_name, card_types)
                .await
            {
                warn!(session_id = %session_id, error = %e, "Failed to save deck");
                store_failure(outbound, ErrorCode::DeckSaveFailed, &e);
                return;
            }
            info!(session_id = %session_id, deck = %deck_name, "Deck saved");
            send_decks(state, session_id, outbound, identity.profile_id).await;
        }

        ClientMsg::LoadDecks => {
            let Some(identity) = state.sessions.identity(&session_id) else {
                reply(outbound, ServerMsg::error(ErrorCode::NotAuthenticated, "Not authenticated"));
                return;
            };
            send_decks(state, session_id, outbound, identity.profile_id).await;
        }

        ClientMsg::Ping { t } => reply(
            outbound,
            ServerMsg::Pong {
                t,
                server_time: unix_millis(),
            },
        ),
    }
}

fn complete_auth(
    state: &AppState,
    session_id: Uuid,
    outbound: &mpsc::Sender<ServerMsg>,
    result: Result<Profile, StoreError>,
    message: &str,
) {
    match result {
        Ok(profile) => {
            state.sessions.authenticate(
                session_id,
                SessionIdentity {
                    profile_id: profile.id,
                    username: profile.username.clone(),
                },
            );
            info!(session_id = %session_id, profile_id = %profile.id, username = %profile.username, "Session authenticated");
            reply(
                outbound,
                ServerMsg::AuthResponse {
                    success: true,
                    player_id: Some(profile.id),
                    message: message.to_string(),
                    player_stats: Some(profile.stats),
                },
            );
        }
        Err(e @ (StoreError::InvalidUsername | StoreError::UsernameTaken)) => {
            auth_failure(outbound, e.to_string())
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Profile lookup failed");
            store_failure(outbound, ErrorCode::PersistenceUnavailable, &e);
        }
    }
}

async fn send_decks(
    state: &AppState,
    session_id: Uuid,
    outbound: &mpsc::Sender<ServerMsg>,
    profile_id: Uuid,
) {
    match state.deck_store.load_decks(profile_id).await {
        Ok(decks) => reply(outbound, ServerMsg::DecksResponse { decks }),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Failed to load decks");
            store_failure(outbound, ErrorCode::PersistenceUnavailable, &e);
        }
    }
}
