use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use shared::services::errors::match_service_errors::ErrorCode;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::actions::{disconnect::handle_disconnect, dispatch};
use crate::protocol::{request_id_of, Ack, ClientFrame, ServerFrame};
use crate::state::WebSocketState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WebSocketState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let connection_id = Uuid::new_v4().to_string();
    let mut frames = state.hub.register(&connection_id);
    info!("WebSocket connection established: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode outgoing frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(message) = receiver.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("WebSocket {} read failed: {}", connection_id, e);
                break;
            }
        };

        // Requests from one socket are handled in arrival order.
        let ack = match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => dispatch(&state, &connection_id, frame).await,
            Err(e) => Ack::error(
                request_id_of(text.as_str()),
                &format!("Invalid message: {}", e),
                ErrorCode::BadRequest,
            ),
        };

        if let Err(e) = state.hub.send_to(&connection_id, ServerFrame::Ack(ack)) {
            warn!("Dropping ack for connection {}: {}", connection_id, e);
            break;
        }
    }

    handle_disconnect(&connection_id, &state).await;
    if let Err(e) = writer.await {
        error!("Writer for connection {} ended abnormally: {}", connection_id, e);
    }
    info!("WebSocket connection disconnected: {}", connection_id);
}
