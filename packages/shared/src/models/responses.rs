use serde::{Deserialize, Serialize};

use crate::models::match_record::{Color, MatchStatus};
use crate::models::snapshot::MatchSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchResponse {
    pub match_code: String,
    pub player_name: String,
    pub player_color: Color,
    pub is_creator: bool,
    pub snapshot: MatchSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMatchResponse {
    pub match_code: String,
    pub player_name: String,
    pub player_color: Color,
    pub is_creator: bool,
    pub is_rejoin: bool,
    pub snapshot: MatchSnapshot,
}

/// Acknowledgement payload for a connection bound to a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResponse {
    pub match_code: String,
    pub player_name: String,
    pub player_color: Color,
    pub is_creator: bool,
    pub state: MatchSnapshot,
}

/// One match a dropped connection was detached from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSession {
    pub match_code: String,
    pub player_name: String,
    pub status: MatchStatus,
}
