pub mod actions;
pub mod hub;
pub mod protocol;
pub mod socket;
pub mod state;

use axum::{extract::FromRef, routing::get, Router};

pub use hub::RoomHub;
pub use state::WebSocketState;

/// The `/ws` endpoint, mountable on any router whose state can hand out a
/// [`WebSocketState`].
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    WebSocketState: FromRef<S>,
{
    Router::new().route("/ws", get(socket::ws_handler))
}
