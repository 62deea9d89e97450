use std::sync::Arc;

use axum::extract::FromRef;
use shared::services::match_service::MatchService;
use websocket_api::{RoomHub, WebSocketState};

#[derive(Clone)]
pub struct AppState {
    pub match_service: Arc<MatchService>,
    pub hub: RoomHub,
}

impl FromRef<AppState> for WebSocketState {
    fn from_ref(state: &AppState) -> Self {
        WebSocketState {
            match_service: state.match_service.clone(),
            hub: state.hub.clone(),
        }
    }
}
