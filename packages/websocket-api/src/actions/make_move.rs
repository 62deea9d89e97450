use shared::models::requests::MoveRequest;

use crate::actions::{field, ActionResult};
use crate::protocol::MovePayload;
use crate::state::WebSocketState;

pub async fn handle_make_move(
    payload: &MovePayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let request = MoveRequest {
        from: payload.from.clone(),
        to: payload.to.clone(),
        promotion: payload.promotion.clone(),
    };

    let snapshot = state
        .match_service
        .make_move(&payload.match_code, connection_id, &request)
        .await?;

    field("state", &snapshot)
}
