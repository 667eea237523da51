use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type ConnectionId = String;
pub type QuestionId = String;
pub type RoomCode = String;

/// Starting (and maximum) life for every player.
pub const MAX_LIFE: u32 = 100;

/// Base damage dealt to the opponent on a correct answer.
pub const CORRECT_DAMAGE: u32 = 15;
/// Base damage taken on an incorrect answer.
pub const INCORRECT_DAMAGE: u32 = 8;
/// Base damage taken when the question timer expires.
pub const TIMEOUT_DAMAGE: u32 = 5;

/// Number of players a room holds once full.
pub const MAX_PLAYERS: usize = 2;

/// Scale a base damage value by the second-chance factor (0.5 while a
/// second chance is in play, 1 otherwise), rounding half-up.
pub fn scaled_damage(base: u32, second_chance: bool) -> u32 {
    let factor = if second_chance { 0.5 } else { 1.0 };
    (base as f64 * factor).round() as u32
}

/// Answer time budget in seconds for a question of the given difficulty.
///
/// Difficulty 1 => 15s, 2 => 13s, 3 => 11s, floored at 10s. The value is
/// informational for the client countdown; the server arms its own timer
/// from the same number.
pub fn time_budget_secs(difficulty: u8) -> u64 {
    (17i64 - 2 * difficulty as i64).max(10) as u64
}

/// A single trivia question as stored in the bank.
///
/// The bank is read-only shared data; per-room "used" tracking lives in the
/// room itself, so this struct carries no mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub topic: String,
    pub text: String,
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct: usize,
    /// 1-3, governs the time budget and is otherwise opaque.
    pub difficulty: u8,
}

/// Wire form of a question. Deliberately omits the correct index — the
/// answer is resolved server-side and reported in the round result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInfo {
    pub id: QuestionId,
    pub topic: String,
    pub text: String,
    pub options: Vec<String>,
    pub difficulty: u8,
    /// Answer time budget in seconds, for the client countdown.
    pub seconds: u64,
}

impl From<&Question> for QuestionInfo {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            topic: q.topic.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
            difficulty: q.difficulty,
            seconds: time_budget_secs(q.difficulty),
        }
    }
}

/// Public player info (no connection handle).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub slot: usize,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub topics: Vec<String>,
    pub life: u32,
    pub max_life: u32,
    pub ready: bool,
    pub joined_at: String,
}

/// Winner identity included in terminal round results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerInfo {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// One entry in the public room listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: RoomCode,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub status: String,
    pub joinable: bool,
    pub created_at: String,
}

/// Aggregate server counters, served over both the WebSocket intent and
/// `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatsInfo {
    pub total_rooms: usize,
    pub active_games: usize,
    pub waiting_rooms: usize,
    pub total_players: usize,
}
