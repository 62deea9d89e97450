use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::models::events::RoomEvent;
use shared::services::errors::match_service_errors::{ErrorCode, MatchServiceError};

/// A request from a client: `{"action": ..., "requestId"?: n, ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<u64>,
    #[serde(flatten)]
    pub action: ClientAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    CreateRoom(RoomPayload),
    JoinRoom(RoomPayload),
    Move(MovePayload),
    Resign(MatchPayload),
    Abort(MatchPayload),
    DrawRequest(MatchPayload),
    DrawAccepted(DrawResponsePayload),
    CancelRoom(MatchPayload),
    Ping,
}

impl ClientAction {
    pub fn name(&self) -> &'static str {
        match self {
            ClientAction::CreateRoom(_) => "createRoom",
            ClientAction::JoinRoom(_) => "joinRoom",
            ClientAction::Move(_) => "move",
            ClientAction::Resign(_) => "resign",
            ClientAction::Abort(_) => "abort",
            ClientAction::DrawRequest(_) => "drawRequest",
            ClientAction::DrawAccepted(_) => "drawAccepted",
            ClientAction::CancelRoom(_) => "cancelRoom",
            ClientAction::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub match_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub match_code: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPayload {
    pub match_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponsePayload {
    pub match_code: String,
    pub accepted: bool,
}

/// Everything the server writes to a socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    Ack(Ack),
    Event(RoomEvent),
}

/// Reply to exactly one client request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub request_id: Option<u64>,
    pub ok: bool,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Ack {
    pub fn ok(request_id: Option<u64>, body: Map<String, Value>) -> Self {
        Ack {
            request_id,
            ok: true,
            body,
        }
    }

    pub fn error(request_id: Option<u64>, message: &str, code: ErrorCode) -> Self {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(message.to_string()));
        body.insert("code".to_string(), Value::String(code.as_str().to_string()));
        Ack {
            request_id,
            ok: false,
            body,
        }
    }

    pub fn from_service_error(request_id: Option<u64>, error: &MatchServiceError) -> Self {
        Self::error(request_id, &error.client_message(), error.code())
    }
}

/// Best effort at recovering the request id of a frame that failed to parse.
pub fn request_id_of(raw: &str) -> Option<u64> {
    serde_json::from_str::<Value>(raw)
        .ok()?
        .get("requestId")?
        .as_u64()
}
