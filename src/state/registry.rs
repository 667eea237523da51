//! Room registry: creates and destroys rooms, generates unique codes,
//! maintains the public listing, and routes disconnects.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use super::{AppState, ConnHandle, Room, SharedRoom};
use crate::error::RoomError;
use crate::protocol::ServerMessage;
use crate::types::{RoomCode, RoomSummary, ServerStatsInfo};

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Generate a random room code not present in `rooms`.
fn generate_code(rooms: &HashMap<RoomCode, SharedRoom>) -> RoomCode {
    let mut rng = rand::rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
            .collect();
        if !rooms.contains_key(&code) {
            return code;
        }
    }
}

impl AppState {
    /// Create a room and seat the creator in slot 0.
    ///
    /// A non-empty `room_name` is used verbatim as the room code (and must
    /// not collide); otherwise a random unique code is generated.
    pub async fn create_room(
        &self,
        conn: &ConnHandle,
        room_name: Option<String>,
    ) -> Result<(RoomCode, usize), RoomError> {
        self.create_room_with_rng(conn, room_name, StdRng::from_os_rng())
            .await
    }

    /// Same as [`create_room`](Self::create_room) but with a seeded
    /// per-room RNG, for deterministic replay in tests.
    pub async fn create_room_seeded(
        &self,
        conn: &ConnHandle,
        room_name: Option<String>,
        seed: u64,
    ) -> Result<(RoomCode, usize), RoomError> {
        self.create_room_with_rng(conn, room_name, StdRng::seed_from_u64(seed))
            .await
    }

    async fn create_room_with_rng(
        &self,
        conn: &ConnHandle,
        room_name: Option<String>,
        rng: StdRng,
    ) -> Result<(RoomCode, usize), RoomError> {
        let requested = room_name.filter(|name| !name.is_empty());

        let code = {
            let mut rooms = self.rooms.write().await;
            let code = match requested {
                Some(name) => {
                    if rooms.contains_key(&name) {
                        return Err(RoomError::DuplicateCode(name));
                    }
                    name
                }
                None => generate_code(&rooms),
            };

            let mut room = Room::new(code.clone(), rng);
            room.add_player(conn.id.clone(), conn.tx.clone(), 0)?;
            rooms.insert(code.clone(), Arc::new(Mutex::new(room)));
            code
        };

        self.player_rooms
            .write()
            .await
            .insert(conn.id.clone(), code.clone());

        tracing::info!(room = %code, conn = %conn.id, "room created");
        self.broadcast_room_list().await;

        Ok((code, 0))
    }

    /// Join an existing room in slot 1.
    pub async fn join_room(&self, conn: &ConnHandle, code: &str) -> Result<usize, RoomError> {
        let room = self
            .room(code)
            .await
            .ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;

        {
            let mut room = room.lock().await;
            room.add_player(conn.id.clone(), conn.tx.clone(), 1)?;
        }

        self.player_rooms
            .write()
            .await
            .insert(conn.id.clone(), code.to_string());

        tracing::info!(room = %code, conn = %conn.id, "player joined room");
        self.broadcast_room_list().await;

        Ok(1)
    }

    /// All non-started rooms, newest first.
    pub async fn list_public_rooms(&self) -> Vec<RoomSummary> {
        let mut waiting: Vec<(DateTime<Utc>, RoomSummary)> = Vec::new();
        {
            let rooms = self.rooms.read().await;
            for room in rooms.values() {
                let room = room.lock().await;
                if !room.started {
                    waiting.push((room.created_at, room.summary()));
                }
            }
        }
        waiting.sort_by(|a, b| b.0.cmp(&a.0));
        waiting.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Push the refreshed public room list to every connected client.
    pub async fn broadcast_room_list(&self) {
        let rooms = self.list_public_rooms().await;
        // No receivers connected is fine.
        let _ = self.lobby.send(ServerMessage::RoomListUpdated { rooms });
    }

    /// Remove a connection from its room and tear the room down when it
    /// becomes empty, or when a not-yet-started room drops to one player.
    pub async fn handle_disconnect(&self, conn_id: &str) {
        let Some(code) = self.player_rooms.write().await.remove(conn_id) else {
            return;
        };
        let Some(room_arc) = self.room(&code).await else {
            return;
        };

        let teardown = {
            let mut room = room_arc.lock().await;
            if room.remove_player(conn_id).is_none() {
                return;
            }
            room.broadcast(ServerMessage::PlayerDisconnected {
                players: room.public_players(),
            });
            let teardown =
                room.player_count() == 0 || (!room.started && room.player_count() == 1);
            if teardown {
                room.bump_timers();
            }
            teardown
        };

        if teardown {
            self.rooms.write().await.remove(&code);
            tracing::info!(room = %code, "room removed");
            self.broadcast_room_list().await;
        }
    }

    pub async fn server_stats(&self) -> ServerStatsInfo {
        let rooms = self.rooms.read().await;
        let mut stats = ServerStatsInfo {
            total_rooms: rooms.len(),
            active_games: 0,
            waiting_rooms: 0,
            total_players: 0,
        };
        for room in rooms.values() {
            let room = room.lock().await;
            if room.started {
                stats.active_games += 1;
            } else {
                stats.waiting_rooms += 1;
            }
            stats.total_players += room.player_count();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::QuestionBank;

    fn state() -> AppState {
        AppState::new(QuestionBank::empty())
    }

    #[tokio::test]
    async fn test_create_room_with_explicit_code() {
        let state = state();
        let (conn, mut rx) = ConnHandle::new();

        let (code, slot) = state
            .create_room(&conn, Some("ABCDEF".into()))
            .await
            .unwrap();
        assert_eq!(code, "ABCDEF");
        assert_eq!(slot, 0);

        // Creator is indexed and received the roster broadcast.
        assert!(state.room_of(&conn.id).await.is_some());
        match rx.recv().await.unwrap() {
            ServerMessage::RoomUpdated { players, started, .. } => {
                assert_eq!(players.len(), 1);
                assert!(!started);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_explicit_code_fails() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();

        state.create_room(&a, Some("SAME01".into())).await.unwrap();
        let err = state
            .create_room(&b, Some("SAME01".into()))
            .await
            .unwrap_err();
        assert_eq!(err, RoomError::DuplicateCode("SAME01".into()));
    }

    #[tokio::test]
    async fn test_generated_codes_are_six_alphanumerics() {
        let state = state();
        let (conn, _rx) = ConnHandle::new();

        let (code, _) = state.create_room(&conn, None).await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
    }

    #[tokio::test]
    async fn test_join_fills_slot_one() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();

        state.create_room(&a, Some("ROOM01".into())).await.unwrap();
        let slot = state.join_room(&b, "ROOM01").await.unwrap();
        assert_eq!(slot, 1);
    }

    #[tokio::test]
    async fn test_join_failures() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();
        let (c, _rx_c) = ConnHandle::new();

        let err = state.join_room(&b, "NOPE99").await.unwrap_err();
        assert_eq!(err, RoomError::RoomNotFound("NOPE99".into()));

        state.create_room(&a, Some("ROOM01".into())).await.unwrap();
        state.join_room(&b, "ROOM01").await.unwrap();
        let err = state.join_room(&c, "ROOM01").await.unwrap_err();
        assert_eq!(err, RoomError::RoomFull("ROOM01".into()));
    }

    #[tokio::test]
    async fn test_join_started_room_fails() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();

        state.create_room(&a, Some("ROOM01".into())).await.unwrap();
        state
            .room("ROOM01")
            .await
            .unwrap()
            .lock()
            .await
            .started = true;

        let err = state.join_room(&b, "ROOM01").await.unwrap_err();
        assert_eq!(err, RoomError::AlreadyStarted("ROOM01".into()));
    }

    #[tokio::test]
    async fn test_room_list_is_newest_first_and_skips_started() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();
        let (c, _rx_c) = ConnHandle::new();

        state.create_room(&a, Some("FIRST1".into())).await.unwrap();
        state.create_room(&b, Some("SECOND".into())).await.unwrap();
        state.create_room(&c, Some("THIRD1".into())).await.unwrap();
        state
            .room("SECOND")
            .await
            .unwrap()
            .lock()
            .await
            .started = true;

        let list = state.list_public_rooms().await;
        let codes: Vec<_> = list.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["THIRD1", "FIRST1"]);
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_unstarted_room() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, mut rx_b) = ConnHandle::new();

        state.create_room(&a, Some("ROOM01".into())).await.unwrap();
        state.join_room(&b, "ROOM01").await.unwrap();

        state.handle_disconnect(&a.id).await;

        // Remaining player was notified, then the room went away.
        let mut saw_notice = false;
        while let Ok(msg) = rx_b.try_recv() {
            if let ServerMessage::PlayerDisconnected { players } = msg {
                assert_eq!(players.len(), 1);
                saw_notice = true;
            }
        }
        assert!(saw_notice);
        assert!(state.room("ROOM01").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_from_started_room_keeps_room() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();

        state.create_room(&a, Some("ROOM01".into())).await.unwrap();
        state.join_room(&b, "ROOM01").await.unwrap();
        state
            .room("ROOM01")
            .await
            .unwrap()
            .lock()
            .await
            .started = true;

        state.handle_disconnect(&a.id).await;
        assert!(state.room("ROOM01").await.is_some());

        // Last player leaving empties and removes it.
        state.handle_disconnect(&b.id).await;
        assert!(state.room("ROOM01").await.is_none());
    }

    #[tokio::test]
    async fn test_server_stats_partition() {
        let state = state();
        let (a, _rx_a) = ConnHandle::new();
        let (b, _rx_b) = ConnHandle::new();
        let (c, _rx_c) = ConnHandle::new();

        state.create_room(&a, Some("WAIT01".into())).await.unwrap();
        state.create_room(&b, Some("PLAY01".into())).await.unwrap();
        state.join_room(&c, "PLAY01").await.unwrap();
        state
            .room("PLAY01")
            .await
            .unwrap()
            .lock()
            .await
            .started = true;

        let stats = state.server_stats().await;
        assert_eq!(
            stats,
            ServerStatsInfo {
                total_rooms: 2,
                active_games: 1,
                waiting_rooms: 1,
                total_players: 3,
            }
        );
    }
}
