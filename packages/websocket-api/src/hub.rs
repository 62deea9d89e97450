use async_trait::async_trait;
use shared::models::events::RoomEvent;
use shared::services::room_broadcaster::{BroadcastError, RoomBroadcaster};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ServerFrame;

pub type FrameSender = mpsc::UnboundedSender<ServerFrame>;
pub type FrameReceiver = mpsc::UnboundedReceiver<ServerFrame>;

/// Live socket connections and the match rooms they belong to.
#[derive(Debug, Clone, Default)]
pub struct RoomHub {
    inner: Arc<RoomHubInner>,
}

#[derive(Debug, Default)]
struct RoomHubInner {
    connections: RwLock<HashMap<String, FrameSender>>,
    rooms: RwLock<HashMap<String, HashSet<String>>>,
}

impl RoomHubInner {
    fn connections(&self) -> RwLockReadGuard<'_, HashMap<String, FrameSender>> {
        self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connections_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, FrameSender>> {
        self.connections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rooms(&self) -> RwLockReadGuard<'_, HashMap<String, HashSet<String>>> {
        self.rooms.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rooms_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, HashSet<String>>> {
        self.rooms.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the stream of frames for it.
    pub fn register(&self, connection_id: &str) -> FrameReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections_mut()
            .insert(connection_id.to_string(), tx);
        rx
    }

    /// Forgets a connection and removes it from every room.
    pub fn unregister(&self, connection_id: &str) {
        self.inner.connections_mut().remove(connection_id);

        let mut rooms = self.inner.rooms_mut();
        rooms.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    pub fn send_to(&self, connection_id: &str, frame: ServerFrame) -> Result<(), BroadcastError> {
        let sender = self
            .inner
            .connections()
            .get(connection_id)
            .cloned()
            .ok_or_else(|| BroadcastError::ConnectionGone(connection_id.to_string()))?;

        sender
            .send(frame)
            .map_err(|_| BroadcastError::ConnectionGone(connection_id.to_string()))
    }

    pub fn room_members(&self, room: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .inner
            .rooms()
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections().len()
    }
}

#[async_trait]
impl RoomBroadcaster for RoomHub {
    async fn join_room(&self, room: &str, connection_id: &str) -> Result<(), BroadcastError> {
        if !self.inner.connections().contains_key(connection_id) {
            return Err(BroadcastError::ConnectionGone(connection_id.to_string()));
        }

        self.inner
            .rooms_mut()
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());
        Ok(())
    }

    async fn emit(
        &self,
        room: &str,
        event: &RoomEvent,
        except: Option<&str>,
    ) -> Result<(), BroadcastError> {
        let members = self.room_members(room);
        let mut gone = Vec::new();

        for member in members.iter().filter(|member| Some(member.as_str()) != except) {
            if self
                .send_to(member, ServerFrame::Event(event.clone()))
                .is_err()
            {
                gone.push(member.clone());
            }
        }

        for member in gone {
            debug!("Dropping closed connection {} from room {}", member, room);
            self.unregister(&member);
        }

        Ok(())
    }

    async fn evict_room(&self, room: &str) -> Result<(), BroadcastError> {
        self.inner.rooms_mut().remove(room);
        Ok(())
    }
}
