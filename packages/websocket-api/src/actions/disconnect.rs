use tracing::{error, info};

use crate::state::WebSocketState;

/// Releases everything a closed socket held: its hub registration and its
/// seat bindings.
pub async fn handle_disconnect(connection_id: &str, state: &WebSocketState) {
    state.hub.unregister(connection_id);

    match state.match_service.detach_connection(connection_id).await {
        Ok(detached) => {
            for session in detached {
                info!(
                    "{} disconnected from match {} ({:?})",
                    session.player_name, session.match_code, session.status
                );
            }
        }
        Err(e) => error!("Failed to detach connection {}: {}", connection_id, e),
    }
}
