//! In-process stand-ins for the clock, broadcaster and code generator seams.
//! Compiled for this crate's tests and, through the `test-support` feature,
//! for the other workspace members' tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::events::RoomEvent;
use crate::services::clock_service::Clock;
use crate::services::code_generator::CodeGenerator;
use crate::services::room_broadcaster::{BroadcastError, RoomBroadcaster};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_ms(&self, millis: i64) {
        *locked(&self.now) += Duration::milliseconds(millis);
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *locked(&self.now) = value;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *locked(&self.now)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub room: String,
    pub event: RoomEvent,
    pub except: Option<String>,
}

impl RecordedEvent {
    pub fn name(&self) -> &'static str {
        self.event.name()
    }
}

/// Broadcaster that remembers everything it was asked to do.
#[derive(Default)]
pub struct RecordingBroadcaster {
    emitted: Mutex<Vec<RecordedEvent>>,
    members: Mutex<HashMap<String, Vec<String>>>,
    evicted: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn events(&self, room: &str) -> Vec<RecordedEvent> {
        locked(&self.emitted)
            .iter()
            .filter(|recorded| recorded.room == room)
            .cloned()
            .collect()
    }

    pub fn event_names(&self, room: &str) -> Vec<&'static str> {
        self.events(room).iter().map(RecordedEvent::name).collect()
    }

    pub fn count(&self, room: &str, name: &str) -> usize {
        self.event_names(room)
            .iter()
            .filter(|emitted| **emitted == name)
            .count()
    }

    pub fn members(&self, room: &str) -> Vec<String> {
        locked(&self.members).get(room).cloned().unwrap_or_default()
    }

    pub fn evicted(&self) -> Vec<String> {
        locked(&self.evicted).clone()
    }

    pub fn clear(&self) {
        locked(&self.emitted).clear();
        locked(&self.evicted).clear();
    }
}

#[async_trait]
impl RoomBroadcaster for RecordingBroadcaster {
    async fn join_room(&self, room: &str, connection_id: &str) -> Result<(), BroadcastError> {
        let mut members = locked(&self.members);
        let room_members = members.entry(room.to_string()).or_default();
        if !room_members.iter().any(|member| member == connection_id) {
            room_members.push(connection_id.to_string());
        }
        Ok(())
    }

    async fn emit(
        &self,
        room: &str,
        event: &RoomEvent,
        except: Option<&str>,
    ) -> Result<(), BroadcastError> {
        locked(&self.emitted).push(RecordedEvent {
            room: room.to_string(),
            event: event.clone(),
            except: except.map(str::to_string),
        });
        Ok(())
    }

    async fn evict_room(&self, room: &str) -> Result<(), BroadcastError> {
        locked(&self.members).remove(room);
        locked(&self.evicted).push(room.to_string());
        Ok(())
    }
}

/// Hands out the given codes in order, then keeps repeating the last one.
pub struct SequenceCodeGenerator {
    codes: Vec<String>,
    next: AtomicUsize,
}

impl SequenceCodeGenerator {
    pub fn new(codes: &[&str]) -> Self {
        SequenceCodeGenerator {
            codes: codes.iter().map(|code| code.to_string()).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn generate(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.codes[index.min(self.codes.len() - 1)].clone()
    }
}
