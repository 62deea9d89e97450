use std::sync::Arc;

use shared::services::match_service::MatchService;

use crate::hub::RoomHub;

/// State the socket handler needs. The hub must be the same instance the
/// service broadcasts through.
#[derive(Clone)]
pub struct WebSocketState {
    pub match_service: Arc<MatchService>,
    pub hub: RoomHub,
}
