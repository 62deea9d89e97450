use tracing::{debug, info, warn};

use crate::{
    models::{
        events::{GameOverEvent, OpponentDisconnectedEvent, RoomEvent},
        match_record::{MatchStatus, Player},
        requests::AttachRequest,
        responses::{AttachResponse, DetachedSession},
    },
    services::{
        clock_service::resolve_timeout,
        errors::match_service_errors::MatchServiceError,
        match_service::{ensure_available, normalize_match_code, normalize_name, MatchService},
    },
};

impl MatchService {
    /// Binds a connection to a player of the match and adds it to the room.
    ///
    /// An unknown name is registered as black only when
    /// `allow_auto_join_second` is set; otherwise it is rejected.
    pub async fn attach_session(
        &self,
        request: &AttachRequest,
    ) -> Result<AttachResponse, MatchServiceError> {
        let match_code = normalize_match_code(&request.match_code)?;
        let name = normalize_name(&request.name)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        let now = self.clock.now();
        ensure_available(&record, now)?;

        let index = match record
            .players
            .iter()
            .position(|player| player.has_name(&name))
        {
            Some(index) => index,
            None if request.allow_auto_join_second => {
                if record.is_full() {
                    return Err(MatchServiceError::Full);
                }
                record.players.push(Player::challenger(&name));
                record.players.len() - 1
            }
            None => {
                return Err(MatchServiceError::Forbidden(
                    "Player not registered for this match.".to_string(),
                ))
            }
        };

        let player = &mut record.players[index];
        player.connection_id = Some(request.connection_id.clone());
        player.connected = true;
        let player = player.clone();

        if record.is_full() && record.status == MatchStatus::Waiting {
            record.activate(now);
        }
        if record.status == MatchStatus::Active && record.active_turn_started_at.is_none() {
            record.active_turn_started_at = Some(now);
        }

        let timed_out = match record.status {
            MatchStatus::Active => {
                let turn = self.rules.side_to_move(&record.position)?;
                resolve_timeout(&mut record, turn, now)
            }
            _ => None,
        };

        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!(
            "Connection {} attached to match {} as {} ({})",
            request.connection_id, match_code, player.name, player.color
        );

        if let Err(e) = self
            .broadcaster
            .join_room(&match_code, &request.connection_id)
            .await
        {
            warn!(
                "Failed to add connection {} to room {}: {}",
                request.connection_id, match_code, e
            );
        }

        let snapshot = self.snapshot(&record)?;
        let mut events = vec![RoomEvent::UpdateBoard(Box::new(snapshot.clone()))];
        if timed_out.is_some() {
            events.push(RoomEvent::GameOver(GameOverEvent {
                match_code: match_code.clone(),
                status: record.status,
                result: record.result.clone(),
            }));
        }
        self.publish(&match_code, events, None).await;

        Ok(AttachResponse {
            match_code,
            player_name: player.name,
            player_color: player.color,
            is_creator: player.is_creator,
            state: snapshot,
        })
    }

    /// Marks the connection's player as disconnected in every match that
    /// still references it. Status never changes here.
    pub async fn detach_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<DetachedSession>, MatchServiceError> {
        let candidates = self.repository.find_by_connection(connection_id).await?;
        let mut detached = Vec::new();

        for candidate in candidates {
            let match_code = candidate.match_code;
            let _guard = self.locks.lock(&match_code).await;

            let mut record = match self.repository.get_match(&match_code).await? {
                Some(record) => record,
                None => continue,
            };

            let player = match record
                .players
                .iter_mut()
                .find(|player| player.connection_id.as_deref() == Some(connection_id))
            {
                Some(player) => player,
                None => continue,
            };
            player.connection_id = None;
            player.connected = false;
            let player_name = player.name.clone();

            record.updated_at = self.clock.now();
            self.repository.save_match(&record).await?;

            debug!(
                "Connection {} detached from match {}",
                connection_id, match_code
            );

            if record.status == MatchStatus::Active {
                let event = RoomEvent::OpponentDisconnected(OpponentDisconnectedEvent {
                    match_code: match_code.clone(),
                    player_name: player_name.clone(),
                });
                self.publish(&match_code, vec![event], Some(connection_id))
                    .await;
            }

            detached.push(DetachedSession {
                match_code,
                player_name,
                status: record.status,
            });
        }

        Ok(detached)
    }
}
