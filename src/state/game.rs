//! Turn state machine: configure/start, wheel spins, answers, timeouts,
//! and the scheduled transitions between them.
//!
//! Every delayed transition is a spawned task carrying the room's timer
//! generation at schedule time. Any superseding resolution bumps the
//! generation, so a stale callback re-enters, sees the mismatch (or a
//! missing room) and drops without broadcasting.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::{AppState, Room};
use crate::error::RoomError;
use crate::protocol::ServerMessage;
use crate::types::*;

/// Delay between both players becoming ready and the match starting.
const READY_START_DELAY: Duration = Duration::from_secs(1);
/// Delay between the start broadcast and the first turn prompt.
const FIRST_TURN_DELAY: Duration = Duration::from_secs(1);
/// Wheel animation window before the question is revealed.
const SPIN_ANIMATION_DELAY: Duration = Duration::from_secs(4);
/// Pause after a round result before the next turn prompt.
const RESULT_PAUSE: Duration = Duration::from_secs(3);
/// Slack on top of the question time budget before the server resolves the
/// timeout itself, leaving room for the client's own timeout signal.
const ANSWER_GRACE: Duration = Duration::from_secs(2);

/// A scheduled room transition.
enum Pending {
    StartGame,
    FirstTurn,
    RevealQuestion,
    NextTurn,
    AnswerDeadline,
}

/// What to do after a timeout has been resolved.
enum TimeoutFollowup {
    /// Second chance granted: re-arm the answer deadline for the same
    /// question's budget.
    Rearm { seconds: u64 },
    TurnEnded { game_over: bool },
}

/// Resolve a timeout for the current active player. Handles both the
/// second-chance grant (first occurrence) and the final resolution.
///
/// Damage is computed before any flag changes: 5 on the first occurrence,
/// round(5 * 0.5) = 3 on the second.
fn resolve_timeout(room: &mut Room) -> TimeoutFollowup {
    room.question_active = false;
    room.bump_timers();

    let damage = scaled_damage(TIMEOUT_DAMAGE, room.second_chance);
    let timed_out = room.active_player;
    let first = !room.second_chance;
    room.apply_damage(timed_out, damage);

    if first && !room.check_game_over() {
        if let Some(question) = room.current_question.as_ref().map(QuestionInfo::from) {
            room.second_chance = true;
            room.active_player = 1 - timed_out;
            room.question_active = true;

            let seconds = question.seconds;
            let message = format!("Second chance for {}", room.slot_name(room.active_player));
            room.broadcast(ServerMessage::SecondChance {
                damage,
                players: room.public_players(),
                new_active_player: room.active_player,
                original_player: room.turn_origin.unwrap_or(timed_out),
                question,
                message,
            });
            return TimeoutFollowup::Rearm { seconds };
        }
    }

    // Second occurrence, or the first timeout itself ended the game.
    room.second_chance = false;
    let game_over = room.check_game_over();
    room.broadcast(ServerMessage::TimeoutFinal {
        damage,
        players: room.public_players(),
        game_over,
        winner: room.winner(),
        round: room.round,
    });
    room.current_question = None;
    room.current_topic = None;

    if game_over {
        tracing::info!(room = %room.code, "game over");
    }
    TimeoutFollowup::TurnEnded { game_over }
}

impl AppState {
    /// Set a player's profile and mark them ready. Silent no-op for
    /// connections that are not in a room. When both players are ready the
    /// match start is scheduled.
    pub async fn configure_player(
        self: &Arc<Self>,
        conn_id: &str,
        name: String,
        avatar: String,
        topics: [String; 2],
    ) {
        let Some(room_arc) = self.room_of(conn_id).await else {
            return;
        };
        let mut room = room_arc.lock().await;

        let Some(player) = room.find_player_mut(conn_id) else {
            return;
        };
        player.name = Some(name);
        player.avatar = Some(avatar);
        player.topics = topics.to_vec();
        player.ready = true;
        let player_name = player.display_name().to_string();

        tracing::info!(room = %room.code, player = %player_name, "player configured");

        let all_ready = room.all_ready();
        room.broadcast(ServerMessage::RoomUpdated {
            players: room.public_players(),
            started: room.started,
            all_ready: Some(all_ready),
        });

        if all_ready && !room.started {
            let code = room.code.clone();
            let gen = room.timer_gen;
            drop(room);
            self.schedule(code, gen, READY_START_DELAY, Pending::StartGame);
        }
    }

    /// Spin the topic wheel. Turn violations come back as errors for the
    /// caller's connection only; room state is untouched.
    pub async fn spin_wheel(self: &Arc<Self>, conn_id: &str) -> Result<(), RoomError> {
        let room_arc = self.room_of(conn_id).await.ok_or(RoomError::NotInRoom)?;
        let mut room = room_arc.lock().await;

        let slot = room.find_player(conn_id).ok_or(RoomError::NotInRoom)?.slot;
        if !room.started || room.game_over {
            return Err(RoomError::MatchNotActive);
        }
        if slot != room.active_player {
            return Err(RoomError::NotYourTurn);
        }
        if room.spinning {
            return Err(RoomError::SpinInProgress);
        }
        if room.question_active {
            return Err(RoomError::QuestionPending);
        }

        room.spinning = true;
        room.turn_origin = Some(slot);

        let topics_len = room.topics_in_play.len();
        let topic_index = room.rng.random_range(0..topics_len);
        let topic = room.topics_in_play[topic_index].clone();
        room.current_topic = Some(topic.clone());

        let selected = {
            let Room {
                used_questions,
                rng,
                ..
            } = &mut *room;
            self.bank.select(&topic, used_questions, rng).cloned()
        };
        room.current_question = selected;

        tracing::info!(room = %room.code, topic = %topic, slot, "wheel spun");
        room.broadcast(ServerMessage::WheelSpun {
            topic,
            topic_index,
            topics_in_play: room.topics_in_play.clone(),
            spinning_player: slot,
        });

        let code = room.code.clone();
        let gen = room.timer_gen;
        drop(room);
        self.schedule(code, gen, SPIN_ANIMATION_DELAY, Pending::RevealQuestion);
        Ok(())
    }

    /// Resolve an answer from the active player. Anything out of turn or
    /// after the question closed is a silent no-op, so replays never apply
    /// damage twice.
    pub async fn answer_question(self: &Arc<Self>, conn_id: &str, choice_index: usize) {
        let Some(room_arc) = self.room_of(conn_id).await else {
            return;
        };
        let mut room = room_arc.lock().await;

        let Some(player) = room.find_player(conn_id) else {
            return;
        };
        let slot = player.slot;
        if slot != room.active_player || !room.question_active {
            return;
        }
        let Some(question) = room.current_question.clone() else {
            return;
        };

        room.question_active = false;
        room.bump_timers();

        let correct = choice_index == question.correct;
        let was_second_chance = room.second_chance;
        let base = if correct {
            CORRECT_DAMAGE
        } else {
            INCORRECT_DAMAGE
        };
        let damage = scaled_damage(base, was_second_chance);
        let target = if correct { 1 - slot } else { slot };
        room.apply_damage(target, damage);

        room.current_question = None;
        room.current_topic = None;

        let game_over = room.check_game_over();
        tracing::info!(room = %room.code, slot, correct, damage, "answer resolved");

        room.broadcast(ServerMessage::RoundResult {
            correct,
            damage,
            players: room.public_players(),
            game_over,
            winner: room.winner(),
            round: room.round,
            is_second_chance: was_second_chance,
        });

        if game_over {
            tracing::info!(room = %room.code, "game over");
            return;
        }

        let code = room.code.clone();
        let gen = room.timer_gen;
        drop(room);
        self.schedule(code, gen, RESULT_PAUSE, Pending::NextTurn);
    }

    /// Client-reported question timeout. Validated exactly like an answer;
    /// the server-side deadline resolves identically if this never arrives.
    pub async fn question_timeout(self: &Arc<Self>, conn_id: &str) {
        let Some(room_arc) = self.room_of(conn_id).await else {
            return;
        };
        let mut room = room_arc.lock().await;

        let Some(player) = room.find_player(conn_id) else {
            return;
        };
        if player.slot != room.active_player || !room.question_active {
            return;
        }
        tracing::info!(room = %room.code, slot = player.slot, "question timeout reported");

        let followup = resolve_timeout(&mut room);
        let code = room.code.clone();
        let gen = room.timer_gen;
        drop(room);
        self.dispatch_timeout_followup(code, gen, followup);
    }

    /// Authoritative server-side deadline for the active question.
    async fn answer_deadline(self: &Arc<Self>, code: &str, gen: u64) {
        let Some(room_arc) = self.room(code).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if room.timer_gen != gen || !room.question_active {
            return;
        }
        tracing::info!(room = %room.code, slot = room.active_player, "answer deadline elapsed");

        let followup = resolve_timeout(&mut room);
        let code = room.code.clone();
        let gen = room.timer_gen;
        drop(room);
        self.dispatch_timeout_followup(code, gen, followup);
    }

    fn dispatch_timeout_followup(
        self: &Arc<Self>,
        code: RoomCode,
        gen: u64,
        followup: TimeoutFollowup,
    ) {
        match followup {
            TimeoutFollowup::Rearm { seconds } => {
                self.schedule(
                    code,
                    gen,
                    Duration::from_secs(seconds) + ANSWER_GRACE,
                    Pending::AnswerDeadline,
                );
            }
            TimeoutFollowup::TurnEnded { game_over: false } => {
                self.schedule(code, gen, RESULT_PAUSE, Pending::NextTurn);
            }
            TimeoutFollowup::TurnEnded { game_over: true } => {}
        }
    }

    /// Transition to IN_PROGRESS once both players are (still) ready.
    async fn start_game(self: &Arc<Self>, code: &str, gen: u64) {
        let Some(room_arc) = self.room(code).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if room.timer_gen != gen || room.started || !room.all_ready() {
            return;
        }

        room.begin_match();
        tracing::info!(room = %room.code, topics = ?room.topics_in_play, "game started");

        room.broadcast(ServerMessage::GameStarted {
            players: room.public_players(),
            topics_in_play: room.topics_in_play.clone(),
            active_player: room.active_player,
            round: room.round,
        });

        let gen = room.timer_gen;
        drop(room);
        self.schedule(code.to_string(), gen, FIRST_TURN_DELAY, Pending::FirstTurn);

        // Started rooms leave the public listing.
        self.broadcast_room_list().await;
    }

    async fn first_turn(self: &Arc<Self>, code: &str, gen: u64) {
        let Some(room_arc) = self.room(code).await else {
            return;
        };
        let room = room_arc.lock().await;
        if room.timer_gen != gen || !room.started || room.game_over {
            return;
        }

        room.broadcast(ServerMessage::TurnUpdated {
            active_player: room.active_player,
            players: room.public_players(),
            round: room.round,
            message: format!(
                "{}'s turn - spin the wheel!",
                room.slot_name(room.active_player)
            ),
        });
    }

    /// Reveal the pre-selected question once the wheel animation window
    /// closes, and arm the authoritative answer deadline.
    async fn reveal_question(self: &Arc<Self>, code: &str, gen: u64) {
        let Some(room_arc) = self.room(code).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if room.timer_gen != gen || !room.started || room.game_over {
            return;
        }

        room.spinning = false;

        match room.current_question.as_ref().map(QuestionInfo::from) {
            Some(question) => {
                room.question_active = true;
                let seconds = question.seconds;

                room.broadcast(ServerMessage::QuestionShown {
                    question,
                    active_player: room.active_player,
                    is_second_chance: room.second_chance,
                });

                let gen = room.timer_gen;
                drop(room);
                self.schedule(
                    code.to_string(),
                    gen,
                    Duration::from_secs(seconds) + ANSWER_GRACE,
                    Pending::AnswerDeadline,
                );
            }
            None => {
                // Topic with no questions configured: abort the turn back
                // to idle instead of crashing the room.
                tracing::error!(
                    room = %room.code,
                    topic = ?room.current_topic,
                    "no question available for topic, aborting turn"
                );
                room.current_topic = None;
            }
        }
    }

    async fn next_turn(self: &Arc<Self>, code: &str, gen: u64) {
        let Some(room_arc) = self.room(code).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if room.timer_gen != gen || !room.started || room.game_over {
            return;
        }

        room.second_chance = false;
        room.active_player = 1 - room.active_player;
        room.round += 1;
        room.current_question = None;
        room.current_topic = None;
        room.spinning = false;
        room.question_active = false;
        room.turn_origin = None;

        room.broadcast(ServerMessage::TurnUpdated {
            active_player: room.active_player,
            players: room.public_players(),
            round: room.round,
            message: format!(
                "Round {} - {}'s turn",
                room.round,
                room.slot_name(room.active_player)
            ),
        });
    }

    fn schedule(self: &Arc<Self>, code: RoomCode, gen: u64, delay: Duration, pending: Pending) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match pending {
                Pending::StartGame => state.start_game(&code, gen).await,
                Pending::FirstTurn => state.first_turn(&code, gen).await,
                Pending::RevealQuestion => state.reveal_question(&code, gen).await,
                Pending::NextTurn => state.next_turn(&code, gen).await,
                Pending::AnswerDeadline => state.answer_deadline(&code, gen).await,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    fn active_room() -> Room {
        let mut room = Room::new("TEST01".into(), StdRng::seed_from_u64(0));
        for (slot, conn) in ["conn-a", "conn-b"].iter().enumerate() {
            room.add_player(conn.to_string(), mpsc::unbounded_channel().0, slot)
                .unwrap();
            let player = room.find_player_mut(conn).unwrap();
            player.name = Some(format!("P{}", slot));
            player.topics = vec!["History".into(), "Science".into()];
            player.ready = true;
        }
        room.begin_match();
        room.current_question = Some(Question {
            id: "q1".into(),
            topic: "History".into(),
            text: "?".into(),
            options: vec!["a".into(), "b".into()],
            correct: 0,
            difficulty: 2,
        });
        room.current_topic = Some("History".into());
        room.question_active = true;
        room.turn_origin = Some(0);
        room
    }

    #[test]
    fn test_first_timeout_grants_second_chance() {
        let mut room = active_room();

        let followup = resolve_timeout(&mut room);

        assert!(matches!(followup, TimeoutFollowup::Rearm { seconds: 13 }));
        assert_eq!(room.players[0].life, 95);
        assert!(room.second_chance);
        assert_eq!(room.active_player, 1);
        assert!(room.question_active);
        assert!(room.current_question.is_some());
    }

    #[test]
    fn test_second_timeout_ends_turn_at_half_damage() {
        let mut room = active_room();
        room.second_chance = true;
        room.active_player = 1;

        let followup = resolve_timeout(&mut room);

        assert!(matches!(
            followup,
            TimeoutFollowup::TurnEnded { game_over: false }
        ));
        // round(5 * 0.5) = 3
        assert_eq!(room.players[1].life, 97);
        assert!(!room.second_chance);
        assert!(!room.question_active);
        assert!(room.current_question.is_none());
    }

    #[test]
    fn test_first_timeout_at_low_life_ends_the_game() {
        let mut room = active_room();
        room.players[0].life = 5;

        let followup = resolve_timeout(&mut room);

        assert!(matches!(
            followup,
            TimeoutFollowup::TurnEnded { game_over: true }
        ));
        assert_eq!(room.players[0].life, 0);
        assert!(room.game_over);
        assert_eq!(room.winner().unwrap().name.as_deref(), Some("P1"));
    }

    #[test]
    fn test_timeout_bumps_timer_generation() {
        let mut room = active_room();
        let before = room.timer_gen;
        resolve_timeout(&mut room);
        assert!(room.timer_gen > before);
    }
}
