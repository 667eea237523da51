//! Room data: one isolated two-player match and its turn state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tokio::sync::mpsc;

use crate::error::RoomError;
use crate::protocol::ServerMessage;
use crate::types::*;

/// A seated player. Owned exclusively by its room; the outbound sender is
/// the player's connection channel and never appears on the wire.
pub struct Player {
    pub conn_id: ConnectionId,
    pub slot: usize,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub topics: Vec<String>,
    pub life: u32,
    pub ready: bool,
    pub joined_at: DateTime<Utc>,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Player {
    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            slot: self.slot,
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            topics: self.topics.clone(),
            life: self.life,
            max_life: MAX_LIFE,
            ready: self.ready,
            joined_at: self.joined_at.to_rfc3339(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("player")
    }
}

/// One match's full state machine. All mutation happens behind the room's
/// mutex in [`crate::state::AppState`], so methods here are synchronous.
pub struct Room {
    pub code: RoomCode,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub started: bool,
    pub game_over: bool,
    /// Insertion order == slot order. Holds at most [`MAX_PLAYERS`].
    pub players: Vec<Player>,

    pub round: u32,
    pub active_player: usize,
    pub second_chance: bool,
    pub topics_in_play: Vec<String>,
    pub current_topic: Option<String>,
    pub current_question: Option<Question>,
    pub spinning: bool,
    pub question_active: bool,
    /// Slot of the player who initiated the current spin; needed to report
    /// second-chance semantics.
    pub turn_origin: Option<usize>,

    /// Question ids this room has consumed, reset per topic on exhaustion.
    pub used_questions: HashSet<QuestionId>,
    /// Per-room RNG for topic and question selection; seedable for replay.
    pub rng: StdRng,
    /// Generation counter guarding scheduled callbacks. Any superseding
    /// transition bumps it, so a stale timer observes a mismatch and drops.
    pub timer_gen: u64,
}

impl Room {
    pub fn new(code: RoomCode, rng: StdRng) -> Self {
        Self {
            name: code.clone(),
            code,
            created_at: Utc::now(),
            started: false,
            game_over: false,
            players: Vec::new(),
            round: 1,
            active_player: 0,
            second_chance: false,
            topics_in_play: Vec::new(),
            current_topic: None,
            current_question: None,
            spinning: false,
            question_active: false,
            turn_origin: None,
            used_questions: HashSet::new(),
            rng,
            timer_gen: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Seat a player and broadcast the updated roster to the room.
    pub fn add_player(
        &mut self,
        conn_id: ConnectionId,
        tx: mpsc::UnboundedSender<ServerMessage>,
        slot: usize,
    ) -> Result<(), RoomError> {
        if self.is_full() {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        if self.started {
            return Err(RoomError::AlreadyStarted(self.code.clone()));
        }

        self.players.push(Player {
            conn_id,
            slot,
            name: None,
            avatar: None,
            topics: Vec::new(),
            life: MAX_LIFE,
            ready: false,
            joined_at: Utc::now(),
            tx,
        });

        tracing::info!(room = %self.code, slot, "player joined");

        self.broadcast(ServerMessage::RoomUpdated {
            players: self.public_players(),
            started: self.started,
            all_ready: None,
        });

        Ok(())
    }

    pub fn remove_player(&mut self, conn_id: &str) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.conn_id == conn_id)?;
        let player = self.players.remove(idx);
        tracing::info!(
            room = %self.code,
            player = player.display_name(),
            "player left"
        );
        Some(player)
    }

    pub fn find_player(&self, conn_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.conn_id == conn_id)
    }

    pub fn find_player_mut(&mut self, conn_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.conn_id == conn_id)
    }

    pub fn player_by_slot(&self, slot: usize) -> Option<&Player> {
        self.players.iter().find(|p| p.slot == slot)
    }

    /// Display name for a slot; falls back when the seat is empty (the
    /// other player may have disconnected mid-turn).
    pub fn slot_name(&self, slot: usize) -> String {
        self.player_by_slot(slot)
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| format!("player {}", slot + 1))
    }

    pub fn all_ready(&self) -> bool {
        self.players.len() == MAX_PLAYERS && self.players.iter().all(|p| p.ready)
    }

    pub fn public_players(&self) -> Vec<PublicPlayer> {
        self.players.iter().map(Player::public).collect()
    }

    pub fn summary(&self) -> RoomSummary {
        let status = if self.player_count() < MAX_PLAYERS {
            "waiting for player"
        } else {
            "full"
        };
        RoomSummary {
            code: self.code.clone(),
            name: self.name.clone(),
            player_count: self.player_count(),
            max_players: MAX_PLAYERS,
            status: status.to_string(),
            joinable: !self.is_full() && !self.started,
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Transition WAITING -> IN_PROGRESS: compute the topic union and reset
    /// per-turn state. Caller has verified both players are ready.
    pub fn begin_match(&mut self) {
        let mut topics = Vec::new();
        for player in &self.players {
            for topic in &player.topics {
                if !topics.contains(topic) {
                    topics.push(topic.clone());
                }
            }
        }
        self.topics_in_play = topics;
        self.started = true;
        self.round = 1;
        self.active_player = 0;
        self.second_chance = false;
        self.spinning = false;
        self.question_active = false;
        self.turn_origin = None;
        self.current_topic = None;
        self.current_question = None;
    }

    /// Apply damage to the player in `slot`, flooring life at 0.
    pub fn apply_damage(&mut self, slot: usize, damage: u32) {
        if let Some(player) = self.players.iter_mut().find(|p| p.slot == slot) {
            player.life = player.life.saturating_sub(damage);
        }
    }

    /// Latch and report the terminal state: game over iff some player's
    /// life reached 0.
    pub fn check_game_over(&mut self) -> bool {
        if self.players.iter().any(|p| p.life == 0) {
            self.game_over = true;
        }
        self.game_over
    }

    pub fn winner(&self) -> Option<WinnerInfo> {
        if !self.game_over {
            return None;
        }
        self.players
            .iter()
            .find(|p| p.life > 0)
            .map(|p| WinnerInfo {
                name: p.name.clone(),
                avatar: p.avatar.clone(),
            })
    }

    /// Invalidate every scheduled callback for this room.
    pub fn bump_timers(&mut self) {
        self.timer_gen += 1;
    }

    /// Send a message to every connected player in the room. Send errors
    /// mean the receiver is gone (disconnecting) and are dropped.
    pub fn broadcast(&self, msg: ServerMessage) {
        for player in &self.players {
            let _ = player.tx.send(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn room() -> Room {
        Room::new("TEST01".into(), StdRng::seed_from_u64(0))
    }

    fn tx() -> mpsc::UnboundedSender<ServerMessage> {
        mpsc::unbounded_channel().0
    }

    fn seat_two(room: &mut Room) {
        room.add_player("conn-a".into(), tx(), 0).unwrap();
        room.add_player("conn-b".into(), tx(), 1).unwrap();
    }

    #[test]
    fn test_room_holds_at_most_two_players() {
        let mut room = room();
        seat_two(&mut room);
        let err = room.add_player("conn-c".into(), tx(), 0).unwrap_err();
        assert_eq!(err, RoomError::RoomFull("TEST01".into()));
    }

    #[test]
    fn test_started_room_rejects_joins() {
        let mut room = room();
        seat_two(&mut room);
        room.begin_match();
        room.remove_player("conn-b");
        let err = room.add_player("conn-c".into(), tx(), 1).unwrap_err();
        assert_eq!(err, RoomError::AlreadyStarted("TEST01".into()));
    }

    #[test]
    fn test_topic_union_dedupes_preserving_first_appearance() {
        let mut room = room();
        seat_two(&mut room);
        room.players[0].topics = vec!["History".into(), "Science".into()];
        room.players[1].topics = vec!["Science".into(), "Art".into()];

        room.begin_match();

        assert_eq!(room.topics_in_play, vec!["History", "Science", "Art"]);
        assert!(room.started);
        assert_eq!(room.round, 1);
        assert_eq!(room.active_player, 0);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let mut room = room();
        seat_two(&mut room);
        room.players[1].life = 4;

        room.apply_damage(1, 15);
        assert_eq!(room.players[1].life, 0);
    }

    #[test]
    fn test_game_over_latches_and_names_survivor() {
        let mut room = room();
        seat_two(&mut room);
        room.players[0].name = Some("Ada".into());
        room.players[1].name = Some("Grace".into());
        room.players[1].life = 0;

        assert!(room.check_game_over());
        let winner = room.winner().unwrap();
        assert_eq!(winner.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_all_ready_requires_both_players() {
        let mut room = room();
        room.add_player("conn-a".into(), tx(), 0).unwrap();
        room.players[0].ready = true;
        assert!(!room.all_ready());

        room.add_player("conn-b".into(), tx(), 1).unwrap();
        assert!(!room.all_ready());
        room.players[1].ready = true;
        assert!(room.all_ready());
    }

    #[test]
    fn test_summary_status_tracks_occupancy() {
        let mut room = room();
        room.add_player("conn-a".into(), tx(), 0).unwrap();
        let summary = room.summary();
        assert_eq!(summary.status, "waiting for player");
        assert!(summary.joinable);

        room.add_player("conn-b".into(), tx(), 1).unwrap();
        let summary = room.summary();
        assert_eq!(summary.status, "full");
        assert!(!summary.joinable);
    }

    #[test]
    fn test_slot_name_survives_missing_seat() {
        let mut room = room();
        seat_two(&mut room);
        room.remove_player("conn-b");
        assert_eq!(room.slot_name(1), "player 2");
    }
}
