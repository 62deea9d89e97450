use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::match_record::{
    Color, LastMove, Match, MatchResult, MatchStatus, Player,
};
use crate::models::time_control::TimeControl;

/// Facts about a position that only the rules engine can answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardFacts {
    pub turn: Option<Color>,
    pub in_check: bool,
    pub check_square: Option<String>,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_draw: bool,
    pub is_game_over: bool,
}

/// Player as shown to clients. Connection ids stay server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub color: Color,
    pub is_creator: bool,
    pub connected: bool,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        PlayerView {
            name: player.name.clone(),
            color: player.color,
            is_creator: player.is_creator,
            connected: player.connected,
        }
    }
}

/// Canonical client-facing view of a match, sent on every accepted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub match_code: String,
    pub position: String,
    pub position_history: Vec<String>,
    pub move_history: Vec<String>,
    pub players: Vec<PlayerView>,
    pub turn: Color,
    pub status: MatchStatus,
    pub time_control: TimeControl,
    pub white_time_ms: u64,
    pub black_time_ms: u64,
    pub active_turn_started_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub result: Option<MatchResult>,
    pub draw_offered_by: Option<Color>,
    pub in_check: bool,
    pub check_square: Option<String>,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub is_stalemate: bool,
    pub is_game_over: bool,
    pub last_move: Option<LastMove>,
}

impl MatchSnapshot {
    pub fn build(record: &Match, facts: BoardFacts) -> Self {
        MatchSnapshot {
            match_code: record.match_code.clone(),
            position: record.position.clone(),
            position_history: record.position_history.clone(),
            move_history: record.move_history.clone(),
            players: record.players.iter().map(PlayerView::from).collect(),
            turn: facts.turn.unwrap_or(Color::White),
            status: record.status,
            time_control: record.time_control.clone(),
            white_time_ms: record.white_time_ms,
            black_time_ms: record.black_time_ms,
            active_turn_started_at: record.active_turn_started_at,
            expires_at: record.expires_at,
            created_at: record.created_at,
            result: record.result.clone(),
            draw_offered_by: record.draw_offered_by,
            in_check: facts.in_check,
            check_square: facts.check_square,
            is_checkmate: facts.is_checkmate,
            is_draw: facts.is_draw,
            is_stalemate: facts.is_stalemate,
            is_game_over: facts.is_game_over,
            last_move: record.last_move.clone(),
        }
    }
}
