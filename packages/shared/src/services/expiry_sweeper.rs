use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::{
    errors::match_service_errors::MatchServiceError, match_service::MatchService,
};

pub const DEFAULT_ROOM_SWEEP_INTERVAL: Duration = Duration::from_millis(15_000);
pub const DEFAULT_CLOCK_SWEEP_INTERVAL: Duration = Duration::from_millis(1_000);

/// Background reconciliation of stale waiting rooms and flagged clocks.
/// Every candidate is re-checked under its match lock before anything is
/// written.
#[derive(Clone)]
pub struct ExpirySweeper {
    service: MatchService,
    room_interval: Duration,
    clock_interval: Duration,
}

/// Stops the sweep loops when shut down or dropped.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Sweep task ended abnormally: {}", e);
            }
        }
        info!("Expiry sweeper stopped");
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

impl ExpirySweeper {
    pub fn new(service: MatchService) -> Self {
        ExpirySweeper {
            service,
            room_interval: DEFAULT_ROOM_SWEEP_INTERVAL,
            clock_interval: DEFAULT_CLOCK_SWEEP_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, room_interval: Duration, clock_interval: Duration) -> Self {
        self.room_interval = room_interval;
        self.clock_interval = clock_interval;
        self
    }

    /// Deletes waiting rooms whose join window closed. Returns how many
    /// were removed.
    pub async fn sweep_waiting_rooms(&self) -> Result<usize, MatchServiceError> {
        let mut expired = 0;

        for match_code in self.service.expired_waiting_codes().await? {
            match self.service.expire_waiting_room(&match_code).await {
                Ok(true) => expired += 1,
                Ok(false) => debug!("Waiting room {} changed before it could expire", match_code),
                Err(e) => error!("Failed to expire waiting room {}: {}", match_code, e),
            }
        }

        Ok(expired)
    }

    /// Finishes active matches whose side to move has run out of time.
    /// Returns how many timed out.
    pub async fn sweep_flagged_games(&self) -> Result<usize, MatchServiceError> {
        let mut flagged = 0;

        for match_code in self.service.running_clock_codes().await? {
            match self.service.enforce_clock(&match_code).await {
                Ok(Some(_)) => flagged += 1,
                Ok(None) => {}
                Err(e) => error!("Failed to enforce clock for match {}: {}", match_code, e),
            }
        }

        Ok(flagged)
    }

    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, _) = watch::channel(false);

        let rooms = {
            let sweeper = self.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweeper.room_interval);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = sweeper.sweep_waiting_rooms().await {
                                error!("Expired waiting-room sweep failed: {}", e);
                            }
                        }
                        _ = stop.changed() => break,
                    }
                }
            })
        };

        let clocks = {
            let sweeper = self.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweeper.clock_interval);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = sweeper.sweep_flagged_games().await {
                                error!("Clock timeout sweep failed: {}", e);
                            }
                        }
                        _ = stop.changed() => break,
                    }
                }
            })
        };

        info!(
            "Expiry sweeper started (rooms every {:?}, clocks every {:?})",
            self.room_interval, self.clock_interval
        );

        SweeperHandle {
            shutdown,
            tasks: vec![rooms, clocks],
        }
    }
}
