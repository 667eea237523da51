pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, ConnHandle};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound) = ConnHandle::new();

    tracing::info!(conn = %conn.id, "WebSocket connected");

    // Push the current room list so the lobby renders immediately.
    conn.send(ServerMessage::RoomListUpdated {
        rooms: state.list_public_rooms().await,
    });

    let mut lobby_rx = state.lobby.subscribe();

    loop {
        tokio::select! {
            // Messages addressed to this connection, directly or through
            // its room's fanout.
            outbound_msg = outbound.recv() => {
                let Some(msg) = outbound_msg else { break };
                if let Ok(json) = serde_json::to_string(&msg) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }

            // Lobby-wide broadcasts (public room list refresh).
            lobby_msg = lobby_rx.recv() => {
                if let Ok(msg) = lobby_msg {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Inbound client frames.
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &conn, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                // Malformed intents are dropped without
                                // touching any state.
                                tracing::debug!(
                                    conn = %conn.id,
                                    error = %e,
                                    "dropping unparseable frame"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(conn = %conn.id, "WebSocket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(conn = %conn.id, error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.handle_disconnect(&conn.id).await;
    tracing::info!(conn = %conn.id, "connection cleaned up");
}
