use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    registrations: usize,
}

type LockTable = Arc<Mutex<HashMap<String, LockEntry>>>;

/// Serializes every mutation of a match behind a per-code async mutex.
///
/// Waiters on one code are served in FIFO order and different codes never
/// contend. An entry lives only while someone holds or waits for it.
#[derive(Clone, Default)]
pub struct MatchLockManager {
    table: LockTable,
}

/// Holds the lock for one match code until dropped.
pub struct MatchLockGuard {
    permit: Option<OwnedMutexGuard<()>>,
    registration: Registration,
}

impl MatchLockGuard {
    pub fn match_code(&self) -> &str {
        &self.registration.match_code
    }
}

impl Drop for MatchLockGuard {
    fn drop(&mut self) {
        // Release the mutex before the registration so the entry can be
        // removed by the last one out.
        self.permit.take();
    }
}

struct Registration {
    table: LockTable,
    match_code: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = table.get_mut(&self.match_code) {
            entry.registrations -= 1;
            if entry.registrations == 0 {
                table.remove(&self.match_code);
                debug!("Released lock entry for match {}", self.match_code);
            }
        }
    }
}

impl MatchLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `match_code`.
    pub async fn lock(&self, match_code: &str) -> MatchLockGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let entry = table
                .entry(match_code.to_string())
                .or_insert_with(|| LockEntry {
                    lock: Arc::new(AsyncMutex::new(())),
                    registrations: 0,
                });
            entry.registrations += 1;
            entry.lock.clone()
        };

        // Registered before waiting, so a cancelled waiter still unregisters.
        let registration = Registration {
            table: self.table.clone(),
            match_code: match_code.to_string(),
        };

        let permit = lock.lock_owned().await;

        MatchLockGuard {
            permit: Some(permit),
            registration,
        }
    }

    /// Codes that currently have a holder or a waiter.
    pub fn active_keys(&self) -> Vec<String> {
        let table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut keys: Vec<String> = table.keys().cloned().collect();
        keys.sort();
        keys
    }
}
