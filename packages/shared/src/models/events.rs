use serde::{Deserialize, Serialize};

use crate::models::match_record::{Color, MatchResult, MatchStatus};
use crate::models::snapshot::MatchSnapshot;

/// Everything the server pushes to the members of a match room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomEvent {
    UpdateBoard(Box<MatchSnapshot>),
    GameOver(GameOverEvent),
    DrawRequest(DrawRequestEvent),
    DrawAccepted(DrawAcceptedEvent),
    Abort(AbortEvent),
    CancelRoom(CancelRoomEvent),
    OpponentDisconnected(OpponentDisconnectedEvent),
}

impl RoomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::UpdateBoard(_) => "updateBoard",
            RoomEvent::GameOver(_) => "gameOver",
            RoomEvent::DrawRequest(_) => "drawRequest",
            RoomEvent::DrawAccepted(_) => "drawAccepted",
            RoomEvent::Abort(_) => "abort",
            RoomEvent::CancelRoom(_) => "cancelRoom",
            RoomEvent::OpponentDisconnected(_) => "opponentDisconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverEvent {
    pub match_code: String,
    pub status: MatchStatus,
    pub result: Option<MatchResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRequestEvent {
    pub match_code: String,
    pub from: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawAcceptedEvent {
    pub match_code: String,
    pub accepted: bool,
    pub by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortEvent {
    pub match_code: String,
    pub by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRoomEvent {
    pub match_code: String,
    pub canceled_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentDisconnectedEvent {
    pub match_code: String,
    pub player_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = RoomEvent::CancelRoom(CancelRoomEvent {
            match_code: "ABC123".to_string(),
            canceled_by: "system".to_string(),
            reason: Some("Room expired before a second player joined.".to_string()),
        });

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "cancelRoom");
        assert_eq!(value["data"]["canceledBy"], "system");
        assert_eq!(value["data"]["matchCode"], "ABC123");
        assert_eq!(event.name(), "cancelRoom");
    }

    #[test]
    fn test_cancel_without_reason_omits_field() {
        let event = RoomEvent::CancelRoom(CancelRoomEvent {
            match_code: "ABC123".to_string(),
            canceled_by: "Alice".to_string(),
            reason: None,
        });

        let value = serde_json::to_value(&event).unwrap();

        assert!(value["data"].get("reason").is_none());
    }
}
