use shared::models::requests::AttachRequest;
use tracing::info;

use crate::actions::{body_of, ActionResult};
use crate::protocol::RoomPayload;
use crate::state::WebSocketState;

/// Creator binding its socket to a match it made over HTTP.
pub async fn handle_create_room(
    payload: &RoomPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    attach(payload, connection_id, state, false).await
}

/// Any player binding its socket; an unknown name takes the black seat.
pub async fn handle_join_room(
    payload: &RoomPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    attach(payload, connection_id, state, true).await
}

async fn attach(
    payload: &RoomPayload,
    connection_id: &str,
    state: &WebSocketState,
    allow_auto_join_second: bool,
) -> ActionResult {
    let attached = state
        .match_service
        .attach_session(&AttachRequest {
            match_code: payload.match_code.clone(),
            name: payload.name.clone(),
            connection_id: connection_id.to_string(),
            allow_auto_join_second,
        })
        .await?;

    info!(
        "{} joined room {} on connection {}",
        attached.player_name, attached.match_code, connection_id
    );

    body_of(&attached)
}
