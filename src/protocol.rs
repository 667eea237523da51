//! Wire protocol: tagged message enums for both directions.
//!
//! Every inbound intent and outbound broadcast is an explicit variant,
//! validated at the boundary by serde. A frame that fails to parse is
//! dropped by the gateway without touching any room state.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Client -> server intents.
///
/// `configure-player` carries its topics as a fixed-size array, so topic
/// arity is enforced at parse time and the room never re-validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        room_name: Option<String>,
    },
    JoinRoom {
        room_code: String,
    },
    RequestRoomList,
    ConfigurePlayer {
        name: String,
        avatar: String,
        topics: [String; 2],
    },
    SpinWheel,
    AnswerQuestion {
        choice_index: usize,
    },
    QuestionTimeout,
    GetServerStats,
}

/// Server -> client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomListUpdated {
        rooms: Vec<RoomSummary>,
    },
    RoomCreationResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_code: Option<RoomCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RoomJoinResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_code: Option<RoomCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RoomUpdated {
        players: Vec<PublicPlayer>,
        started: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        all_ready: Option<bool>,
    },
    GameStarted {
        players: Vec<PublicPlayer>,
        topics_in_play: Vec<String>,
        active_player: usize,
        round: u32,
    },
    TurnUpdated {
        active_player: usize,
        players: Vec<PublicPlayer>,
        round: u32,
        message: String,
    },
    WheelSpun {
        topic: String,
        /// Index into `topics_in_play` of the chosen topic, so every client
        /// computes the same wheel stop position.
        topic_index: usize,
        topics_in_play: Vec<String>,
        spinning_player: usize,
    },
    QuestionShown {
        #[serde(rename = "questionPayload")]
        question: QuestionInfo,
        active_player: usize,
        is_second_chance: bool,
    },
    SecondChance {
        damage: u32,
        players: Vec<PublicPlayer>,
        new_active_player: usize,
        original_player: usize,
        question: QuestionInfo,
        message: String,
    },
    RoundResult {
        correct: bool,
        damage: u32,
        players: Vec<PublicPlayer>,
        game_over: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<WinnerInfo>,
        round: u32,
        is_second_chance: bool,
    },
    TimeoutFinal {
        damage: u32,
        players: Vec<PublicPlayer>,
        game_over: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<WinnerInfo>,
        round: u32,
    },
    ErrorMessage {
        text: String,
    },
    PlayerDisconnected {
        players: Vec<PublicPlayer>,
    },
    ServerStats {
        total_rooms: usize,
        active_games: usize,
        waiting_rooms: usize,
        total_players: usize,
    },
}

impl ServerMessage {
    pub fn creation_ok(code: RoomCode, slot: usize) -> Self {
        ServerMessage::RoomCreationResult {
            success: true,
            room_code: Some(code),
            slot: Some(slot),
            error: None,
        }
    }

    pub fn creation_err(error: String) -> Self {
        ServerMessage::RoomCreationResult {
            success: false,
            room_code: None,
            slot: None,
            error: Some(error),
        }
    }

    pub fn join_ok(code: RoomCode, slot: usize) -> Self {
        ServerMessage::RoomJoinResult {
            success: true,
            room_code: Some(code),
            slot: Some(slot),
            error: None,
        }
    }

    pub fn join_err(error: String) -> Self {
        ServerMessage::RoomJoinResult {
            success: false,
            room_code: None,
            slot: None,
            error: Some(error),
        }
    }

    pub fn stats(s: ServerStatsInfo) -> Self {
        ServerMessage::ServerStats {
            total_rooms: s.total_rooms,
            active_games: s.active_games,
            waiting_rooms: s.waiting_rooms,
            total_players: s.total_players,
        }
    }
}
