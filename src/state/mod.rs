mod game;
mod registry;
mod room;

pub use room::{Player, Room};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

use crate::protocol::ServerMessage;
use crate::questions::QuestionBank;
use crate::types::{ConnectionId, RoomCode};

/// A room behind its own mutex: operations on one room serialize, while
/// different rooms proceed fully in parallel.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Shared application state: the room registry and the global question bank.
pub struct AppState {
    /// room code -> room.
    pub rooms: RwLock<HashMap<RoomCode, SharedRoom>>,
    /// connection id -> owning room code, for O(1) dispatch.
    pub player_rooms: RwLock<HashMap<ConnectionId, RoomCode>>,
    /// Broadcast channel for lobby-wide messages (room list refresh).
    pub lobby: broadcast::Sender<ServerMessage>,
    /// Immutable question bank shared by every room.
    pub bank: Arc<QuestionBank>,
}

impl AppState {
    pub fn new(bank: QuestionBank) -> Self {
        let (lobby, _rx) = broadcast::channel(100);
        Self {
            rooms: RwLock::new(HashMap::new()),
            player_rooms: RwLock::new(HashMap::new()),
            lobby,
            bank: Arc::new(bank),
        }
    }

    /// Look up a room by code.
    pub async fn room(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Resolve the room a connection currently occupies.
    pub async fn room_of(&self, conn_id: &str) -> Option<SharedRoom> {
        let code = self.player_rooms.read().await.get(conn_id).cloned()?;
        self.room(&code).await
    }
}

/// Handle for one client connection: its id plus the outbound channel the
/// socket task drains. Cloned senders live inside room player entries.
#[derive(Clone)]
pub struct ConnHandle {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: ulid::Ulid::new().to_string(),
            tx,
        };
        (handle, rx)
    }

    /// Send directly to this connection; a closed receiver means the socket
    /// is going away and the message is dropped.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }
}
