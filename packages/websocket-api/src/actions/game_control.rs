use crate::actions::{field, ActionResult};
use crate::protocol::{DrawResponsePayload, MatchPayload};
use crate::state::WebSocketState;

pub async fn handle_resign(
    payload: &MatchPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let snapshot = state
        .match_service
        .resign(&payload.match_code, connection_id)
        .await?;
    field("state", &snapshot)
}

pub async fn handle_abort(
    payload: &MatchPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let snapshot = state
        .match_service
        .abort(&payload.match_code, connection_id)
        .await?;
    field("state", &snapshot)
}

pub async fn handle_draw_request(
    payload: &MatchPayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let snapshot = state
        .match_service
        .offer_draw(&payload.match_code, connection_id)
        .await?;
    field("state", &snapshot)
}

/// Accepts or declines the opponent's outstanding draw offer.
pub async fn handle_draw_response(
    payload: &DrawResponsePayload,
    connection_id: &str,
    state: &WebSocketState,
) -> ActionResult {
    let snapshot = state
        .match_service
        .respond_to_draw(&payload.match_code, connection_id, payload.accepted)
        .await?;

    let mut body = field("state", &snapshot)?;
    body.insert("accepted".to_string(), payload.accepted.into());
    Ok(body)
}
