use serde::Serialize;
use serde_json::{Map, Value};
use shared::services::errors::match_service_errors::{
    ErrorCode, MatchServiceError, SERVER_ERROR_MESSAGE,
};
use std::fmt;
use tracing::{debug, error};

use crate::protocol::{Ack, ClientAction, ClientFrame};
use crate::state::WebSocketState;

pub mod cancel_room;
pub mod disconnect;
pub mod game_control;
pub mod join_room;
pub mod make_move;

#[derive(Debug)]
pub enum ActionError {
    Service(MatchServiceError),
    Encoding(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Service(e) => write!(f, "{}", e),
            ActionError::Encoding(msg) => write!(f, "Failed to encode reply: {}", msg),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<MatchServiceError> for ActionError {
    fn from(error: MatchServiceError) -> Self {
        ActionError::Service(error)
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(error: serde_json::Error) -> Self {
        ActionError::Encoding(error.to_string())
    }
}

pub type ActionResult = Result<Map<String, Value>, ActionError>;

/// Serializes a reply struct into the fields of an ack.
pub(crate) fn body_of<T: Serialize>(value: &T) -> ActionResult {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => {
            let mut fields = Map::new();
            fields.insert("data".to_string(), other);
            Ok(fields)
        }
    }
}

pub(crate) fn field<T: Serialize>(key: &str, value: &T) -> ActionResult {
    let mut fields = Map::new();
    fields.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(fields)
}

/// Runs one client request and builds its acknowledgement.
pub async fn dispatch(state: &WebSocketState, connection_id: &str, frame: ClientFrame) -> Ack {
    let request_id = frame.request_id;
    let action = frame.action.name();
    debug!("Connection {} sent {}", connection_id, action);

    let result = match &frame.action {
        ClientAction::CreateRoom(payload) => {
            join_room::handle_create_room(payload, connection_id, state).await
        }
        ClientAction::JoinRoom(payload) => {
            join_room::handle_join_room(payload, connection_id, state).await
        }
        ClientAction::Move(payload) => {
            make_move::handle_make_move(payload, connection_id, state).await
        }
        ClientAction::Resign(payload) => {
            game_control::handle_resign(payload, connection_id, state).await
        }
        ClientAction::Abort(payload) => {
            game_control::handle_abort(payload, connection_id, state).await
        }
        ClientAction::DrawRequest(payload) => {
            game_control::handle_draw_request(payload, connection_id, state).await
        }
        ClientAction::DrawAccepted(payload) => {
            game_control::handle_draw_response(payload, connection_id, state).await
        }
        ClientAction::CancelRoom(payload) => {
            cancel_room::handle_cancel_room(payload, connection_id, state).await
        }
        ClientAction::Ping => field("pong", &true),
    };

    match result {
        Ok(body) => Ack::ok(request_id, body),
        Err(ActionError::Service(e)) => {
            if e.is_server_error() {
                error!(
                    "{} from connection {} failed: {}",
                    action, connection_id, e
                );
            } else {
                debug!("{} from connection {} rejected: {}", action, connection_id, e);
            }
            Ack::from_service_error(request_id, &e)
        }
        Err(e @ ActionError::Encoding(_)) => {
            error!("{} from connection {} failed: {}", action, connection_id, e);
            Ack::error(request_id, SERVER_ERROR_MESSAGE, ErrorCode::ServerError)
        }
    }
}
