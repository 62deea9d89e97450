use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::time_control::TimeControl;

pub const MATCH_CODE_LENGTH: usize = 6;

/// How long a freshly created match waits for its second player.
pub const JOIN_WINDOW_MS: i64 = 10 * 60 * 1000;
pub const ACTIVE_MATCH_RETENTION_MS: i64 = 12 * 60 * 60 * 1000;
pub const FINISHED_MATCH_RETENTION_MS: i64 = 6 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Active,
    Finished,
    Aborted,
    Canceled,
}

impl MatchStatus {
    /// Finished, aborted and canceled matches never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchStatus::Finished | MatchStatus::Aborted | MatchStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    Checkmate,
    Draw,
    Resignation,
    Timeout,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub outcome: ResultOutcome,
    pub winner_color: Option<Color>,
    pub reason: String,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub notation: String,
    pub capture: bool,
    pub check: bool,
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub color: Color,
    pub connection_id: Option<String>,
    pub is_creator: bool,
    pub connected: bool,
}

impl Player {
    pub fn creator(name: &str) -> Self {
        Player {
            name: name.to_string(),
            color: Color::White,
            connection_id: None,
            is_creator: true,
            connected: false,
        }
    }

    pub fn challenger(name: &str) -> Self {
        Player {
            name: name.to_string(),
            color: Color::Black,
            connection_id: None,
            is_creator: false,
            connected: false,
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// The persisted match aggregate. Everything a client sees is derived from
/// this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_code: String,
    pub players: Vec<Player>,
    pub position: String,
    pub position_history: Vec<String>,
    pub move_history: Vec<String>,
    pub status: MatchStatus,
    pub result: Option<MatchResult>,
    pub last_move: Option<LastMove>,
    pub draw_offered_by: Option<Color>,
    pub time_control: TimeControl,
    pub white_time_ms: u64,
    pub black_time_ms: u64,
    pub active_turn_started_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        match_code: &str,
        creator_name: &str,
        time_control: TimeControl,
        initial_position: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Match {
            match_code: match_code.to_string(),
            players: vec![Player::creator(creator_name)],
            position: initial_position.to_string(),
            position_history: vec![initial_position.to_string()],
            move_history: vec![],
            status: MatchStatus::Waiting,
            result: None,
            last_move: None,
            draw_offered_by: None,
            white_time_ms: time_control.initial_time_ms,
            black_time_ms: time_control.initial_time_ms,
            time_control,
            active_turn_started_at: None,
            expires_at: now + Duration::milliseconds(JOIN_WINDOW_MS),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.has_name(name))
    }

    pub fn player_by_connection(&self, connection_id: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.connection_id.as_deref() == Some(connection_id))
    }

    pub fn player_by_color(&self, color: Color) -> Option<&Player> {
        self.players.iter().find(|player| player.color == color)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn join_window_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == MatchStatus::Waiting && self.expires_at <= now
    }

    pub fn clock_ms(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_time_ms,
            Color::Black => self.black_time_ms,
        }
    }

    pub fn set_clock_ms(&mut self, color: Color, value: u64) {
        match color {
            Color::White => self.white_time_ms = value,
            Color::Black => self.black_time_ms = value,
        }
    }

    /// Moves a full waiting room to active and starts white's clock.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = MatchStatus::Active;
        self.expires_at = now + Duration::milliseconds(ACTIVE_MATCH_RETENTION_MS);
        self.active_turn_started_at = Some(now);
    }

    /// Records a terminal result. `status` must be `Finished` or `Aborted`.
    pub fn conclude(&mut self, status: MatchStatus, result: MatchResult, now: DateTime<Utc>) {
        self.status = status;
        self.result = Some(result);
        self.draw_offered_by = None;
        self.active_turn_started_at = None;
        self.expires_at = now + Duration::milliseconds(FINISHED_MATCH_RETENTION_MS);
    }
}
