use async_trait::async_trait;

use crate::models::events::RoomEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    ConnectionGone(String),
    Transport(String),
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastError::ConnectionGone(id) => write!(f, "Connection {} is gone", id),
            BroadcastError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for BroadcastError {}

/// Room-based fan-out of match events to connected clients. A room is
/// named after its match code.
#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    async fn join_room(&self, room: &str, connection_id: &str) -> Result<(), BroadcastError>;

    /// Sends `event` to every member of `room` except `except`, if given.
    async fn emit(
        &self,
        room: &str,
        event: &RoomEvent,
        except: Option<&str>,
    ) -> Result<(), BroadcastError>;

    /// Removes every connection from `room`.
    async fn evict_room(&self, room: &str) -> Result<(), BroadcastError>;
}
