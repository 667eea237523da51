//! WebSocket message dispatch
//!
//! Translates parsed client intents into typed registry/room calls and
//! returns the direct reply for the calling connection, if any. Room-wide
//! broadcasts travel through the players' outbound channels instead.

use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, ConnHandle};

/// Handle a client message and return the optional direct response.
pub async fn handle_message(
    msg: ClientMessage,
    conn: &ConnHandle,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { room_name } => {
            match state.create_room(conn, room_name).await {
                Ok((code, slot)) => Some(ServerMessage::creation_ok(code, slot)),
                Err(e) => Some(ServerMessage::creation_err(e.to_string())),
            }
        }

        ClientMessage::JoinRoom { room_code } => match state.join_room(conn, &room_code).await {
            Ok(slot) => Some(ServerMessage::join_ok(room_code, slot)),
            Err(e) => Some(ServerMessage::join_err(e.to_string())),
        },

        ClientMessage::RequestRoomList => Some(ServerMessage::RoomListUpdated {
            rooms: state.list_public_rooms().await,
        }),

        ClientMessage::ConfigurePlayer {
            name,
            avatar,
            topics,
        } => {
            state.configure_player(&conn.id, name, avatar, topics).await;
            None
        }

        ClientMessage::SpinWheel => match state.spin_wheel(&conn.id).await {
            Ok(()) => None,
            // Turn violations go back to the offending connection only.
            Err(e) if e.is_turn_violation() => Some(ServerMessage::ErrorMessage {
                text: e.to_string(),
            }),
            Err(_) => None,
        },

        ClientMessage::AnswerQuestion { choice_index } => {
            state.answer_question(&conn.id, choice_index).await;
            None
        }

        ClientMessage::QuestionTimeout => {
            state.question_timeout(&conn.id).await;
            None
        }

        ClientMessage::GetServerStats => Some(ServerMessage::stats(state.server_stats().await)),
    }
}
