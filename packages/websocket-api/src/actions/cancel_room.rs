use shared::services::match_service::normalize_match_code;
use tracing::info;

use crate::actions::{field, ActionResult};
use crate::protocol::MatchPayload;
use crate::state::WebSocketState;

pub async fn handle_cancel_room(
    payload: &MatchPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let match_code = normalize_match_code(&payload.match_code)?;

    state
        .match_service
        .cancel_room(&match_code, connection_id)
        .await?;

    info!("Room {} canceled by connection {}", match_code, connection_id);
    field("matchCode", &match_code)
}
