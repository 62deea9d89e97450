use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    models::{
        events::{
            AbortEvent, CancelRoomEvent, DrawAcceptedEvent, DrawRequestEvent, GameOverEvent,
            RoomEvent,
        },
        match_record::{
            Color, Match, MatchResult, MatchStatus, Player, ResultOutcome, MATCH_CODE_LENGTH,
        },
        requests::{CreateMatchRequest, JoinMatchRequest, MoveRequest},
        responses::{CreateMatchResponse, JoinMatchResponse},
        snapshot::MatchSnapshot,
        time_control::{TimeControl, DEFAULT_TIME_CONTROL_KEY},
    },
    repositories::{
        errors::match_repository_errors::MatchRepositoryError,
        match_repository::MatchRepository,
    },
    services::{
        chess_service::{RulesEngine, TerminalCondition},
        clock_service::{hand_over_turn, resolve_timeout, settle_mover_clock, Clock},
        code_generator::{CodeGenerator, RandomCodeGenerator},
        errors::match_service_errors::MatchServiceError,
        match_lock::MatchLockManager,
        room_broadcaster::RoomBroadcaster,
    },
};

pub const CODE_GENERATION_ATTEMPTS: usize = 30;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 24;
pub const SYSTEM_ACTOR: &str = "system";
pub const ROOM_EXPIRED_REASON: &str = "Room expired before a second player joined.";

/// Collapses runs of whitespace and trims, then checks the length.
pub fn normalize_name(raw: &str) -> Result<String, MatchServiceError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let length = name.chars().count();

    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        return Err(MatchServiceError::ValidationError(
            "Name must be between 2 and 24 characters.".to_string(),
        ));
    }

    Ok(name)
}

pub fn normalize_match_code(raw: &str) -> Result<String, MatchServiceError> {
    let code = raw.trim().to_uppercase();

    let valid = code.len() == MATCH_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if !valid {
        return Err(MatchServiceError::ValidationError(
            "Match code must be 6 alphanumeric characters.".to_string(),
        ));
    }

    Ok(code)
}

/// A missing or empty key selects the default preset.
pub fn normalize_time_control(raw: Option<&str>) -> Result<TimeControl, MatchServiceError> {
    let key = match raw.map(str::trim) {
        None | Some("") => DEFAULT_TIME_CONTROL_KEY,
        Some(key) => key,
    };

    TimeControl::by_key(key).ok_or_else(|| {
        MatchServiceError::ValidationError(
            "Invalid time control. Choose Rapid 15|10 or Rapid 10|5.".to_string(),
        )
    })
}

/// Rejects matches that can no longer be joined or attached to.
pub(crate) fn ensure_available(record: &Match, now: DateTime<Utc>) -> Result<(), MatchServiceError> {
    match record.status {
        MatchStatus::Canceled => Err(MatchServiceError::Gone(
            "Match was canceled by the host.".to_string(),
        )),
        MatchStatus::Finished | MatchStatus::Aborted => Err(MatchServiceError::Gone(
            "Match has already ended.".to_string(),
        )),
        MatchStatus::Waiting if record.join_window_elapsed(now) => Err(MatchServiceError::Gone(
            "Match code expired. Please create a new match.".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Rejects in-game actions on matches that are not being played.
fn ensure_in_play(record: &Match) -> Result<(), MatchServiceError> {
    match record.status {
        MatchStatus::Waiting => Err(MatchServiceError::Conflict(
            "Waiting for opponent to join.".to_string(),
        )),
        MatchStatus::Canceled => Err(MatchServiceError::Gone(
            "Match was canceled by the host.".to_string(),
        )),
        MatchStatus::Finished | MatchStatus::Aborted => Err(MatchServiceError::Gone(
            "Match has already ended.".to_string(),
        )),
        MatchStatus::Active if !record.is_full() => Err(MatchServiceError::Conflict(
            "Waiting for opponent to join.".to_string(),
        )),
        MatchStatus::Active => Ok(()),
    }
}

fn requester(record: &Match, connection_id: &str) -> Result<Player, MatchServiceError> {
    record
        .player_by_connection(connection_id)
        .cloned()
        .ok_or_else(|| {
            MatchServiceError::Forbidden("Socket is not registered in this match.".to_string())
        })
}

fn result_for(condition: TerminalCondition) -> MatchResult {
    match condition {
        TerminalCondition::Checkmate { winner } => MatchResult {
            outcome: ResultOutcome::Checkmate,
            winner_color: Some(winner),
            reason: format!("{} won by checkmate.", winner),
            actor: Some(winner.to_string()),
        },
        draw => MatchResult {
            outcome: ResultOutcome::Draw,
            winner_color: None,
            reason: draw.draw_reason().unwrap_or("Draw.").to_string(),
            actor: None,
        },
    }
}

fn game_over_event(record: &Match) -> RoomEvent {
    RoomEvent::GameOver(GameOverEvent {
        match_code: record.match_code.clone(),
        status: record.status,
        result: record.result.clone(),
    })
}

/// Owns every state transition of a match. Mutations run under the
/// per-match lock, load the record fresh, persist it, and broadcast before
/// the lock is released.
#[derive(Clone)]
pub struct MatchService {
    pub(crate) repository: Arc<dyn MatchRepository + Send + Sync>,
    pub(crate) rules: Arc<dyn RulesEngine>,
    pub(crate) broadcaster: Arc<dyn RoomBroadcaster>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: MatchLockManager,
    codes: Arc<dyn CodeGenerator>,
}

impl MatchService {
    pub fn new(
        repository: Arc<dyn MatchRepository + Send + Sync>,
        rules: Arc<dyn RulesEngine>,
        broadcaster: Arc<dyn RoomBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        MatchService {
            repository,
            rules,
            broadcaster,
            clock,
            locks: MatchLockManager::new(),
            codes: Arc::new(RandomCodeGenerator),
        }
    }

    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    pub fn locks(&self) -> &MatchLockManager {
        &self.locks
    }

    pub(crate) async fn load(&self, match_code: &str) -> Result<Match, MatchServiceError> {
        self.repository
            .get_match(match_code)
            .await?
            .ok_or(MatchServiceError::NotFound)
    }

    pub fn snapshot(&self, record: &Match) -> Result<MatchSnapshot, MatchServiceError> {
        let facts = self
            .rules
            .board_facts(&record.position, &record.position_history)?;
        Ok(MatchSnapshot::build(record, facts))
    }

    pub(crate) fn board_event(&self, record: &Match) -> Result<RoomEvent, MatchServiceError> {
        Ok(RoomEvent::UpdateBoard(Box::new(self.snapshot(record)?)))
    }

    /// Emits events in order. Failures are logged and never undo a commit.
    pub(crate) async fn publish(&self, room: &str, events: Vec<RoomEvent>, except: Option<&str>) {
        for event in events {
            if let Err(e) = self.broadcaster.emit(room, &event, except).await {
                warn!("Failed to emit {} to room {}: {}", event.name(), room, e);
            }
        }
    }

    pub(crate) async fn evict(&self, room: &str) {
        if let Err(e) = self.broadcaster.evict_room(room).await {
            warn!("Failed to evict room {}: {}", room, e);
        }
    }

    /// Finishes the match if the side to move has flagged. The finished
    /// match is persisted and broadcast, and the caller gets `Timeout`.
    async fn settle_pending_timeout(
        &self,
        record: &mut Match,
        now: DateTime<Utc>,
    ) -> Result<(), MatchServiceError> {
        let turn = self.rules.side_to_move(&record.position)?;

        if resolve_timeout(record, turn, now).is_none() {
            return Ok(());
        }

        info!("Match {} timed out for {}", record.match_code, turn);
        record.updated_at = now;
        self.repository.save_match(record).await?;

        let events = vec![self.board_event(record)?, game_over_event(record)];
        self.publish(&record.match_code, events, None).await;

        Err(MatchServiceError::Timeout)
    }

    pub async fn create_match(
        &self,
        request: &CreateMatchRequest,
    ) -> Result<CreateMatchResponse, MatchServiceError> {
        let name = normalize_name(&request.name)?;
        let time_control = normalize_time_control(request.time_control_key.as_deref())?;

        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let match_code = self.codes.generate();
            if self.repository.get_match(&match_code).await?.is_some() {
                debug!("Match code {} already taken", match_code);
                continue;
            }

            let record = Match::new(
                &match_code,
                &name,
                time_control.clone(),
                &self.rules.initial_position(),
                self.clock.now(),
            );

            match self.repository.create_match(&record).await {
                Ok(()) => {}
                Err(MatchRepositoryError::AlreadyExists) => continue,
                Err(e) => return Err(e.into()),
            }

            info!("Created match {} for {}", match_code, name);
            return Ok(CreateMatchResponse {
                match_code,
                player_name: name,
                player_color: Color::White,
                is_creator: true,
                snapshot: self.snapshot(&record)?,
            });
        }

        warn!("Gave up generating a match code after {} attempts", CODE_GENERATION_ATTEMPTS);
        Err(MatchServiceError::Capacity)
    }

    pub async fn join_match(
        &self,
        request: &JoinMatchRequest,
    ) -> Result<JoinMatchResponse, MatchServiceError> {
        let match_code = normalize_match_code(&request.match_code)?;
        let name = normalize_name(&request.name)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        let now = self.clock.now();
        ensure_available(&record, now)?;

        if let Some(existing) = record.player_by_name(&name) {
            debug!("{} rejoined match {}", existing.name, match_code);
            return Ok(JoinMatchResponse {
                match_code,
                player_name: existing.name.clone(),
                player_color: existing.color,
                is_creator: existing.is_creator,
                is_rejoin: true,
                snapshot: self.snapshot(&record)?,
            });
        }

        if record.is_full() {
            return Err(MatchServiceError::Full);
        }

        record.players.push(Player::challenger(&name));
        if record.is_full() && record.status == MatchStatus::Waiting {
            record.activate(now);
        }
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!("{} joined match {}", name, match_code);
        let event = self.board_event(&record)?;
        self.publish(&match_code, vec![event], None).await;

        Ok(JoinMatchResponse {
            match_code,
            player_name: name,
            player_color: Color::Black,
            is_creator: false,
            is_rejoin: false,
            snapshot: self.snapshot(&record)?,
        })
    }

    pub async fn find_snapshot(&self, raw_code: &str) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;
        let record = self.load(&match_code).await?;
        self.snapshot(&record)
    }

    pub async fn make_move(
        &self,
        raw_code: &str,
        connection_id: &str,
        request: &MoveRequest,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        ensure_in_play(&record)?;
        let now = self.clock.now();
        self.settle_pending_timeout(&mut record, now).await?;

        let player = requester(&record, connection_id)?;
        let turn = self.rules.side_to_move(&record.position)?;
        if player.color != turn {
            return Err(MatchServiceError::Conflict("Not your turn.".to_string()));
        }

        let applied = self.rules.apply_move(&record.position, request)?;

        record.position = applied.position;
        record.position_history.push(record.position.clone());
        record.move_history.push(applied.descriptor.notation.clone());
        record.last_move = Some(applied.descriptor);
        record.draw_offered_by = None;
        settle_mover_clock(&mut record, player.color, now);

        let terminal = self
            .rules
            .terminal_condition(&record.position, &record.position_history)?;
        match terminal {
            Some(condition) => record.conclude(MatchStatus::Finished, result_for(condition), now),
            None => hand_over_turn(&mut record, player.color, now),
        }
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        debug!(
            "{} played {} in match {}",
            player.name,
            record.move_history.last().map(String::as_str).unwrap_or_default(),
            match_code
        );

        let snapshot = self.snapshot(&record)?;
        let mut events = vec![RoomEvent::UpdateBoard(Box::new(snapshot.clone()))];
        if record.status.is_terminal() {
            info!("Match {} finished: {:?}", match_code, terminal);
            events.push(game_over_event(&record));
        }
        self.publish(&match_code, events, None).await;

        Ok(snapshot)
    }

    pub async fn resign(
        &self,
        raw_code: &str,
        connection_id: &str,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        ensure_in_play(&record)?;
        let now = self.clock.now();
        self.settle_pending_timeout(&mut record, now).await?;

        let player = requester(&record, connection_id)?;
        let result = MatchResult {
            outcome: ResultOutcome::Resignation,
            winner_color: Some(player.color.opponent()),
            reason: format!("{} resigned.", player.name),
            actor: Some(player.name.clone()),
        };
        record.conclude(MatchStatus::Finished, result, now);
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!("{} resigned match {}", player.name, match_code);
        let snapshot = self.snapshot(&record)?;
        let events = vec![
            RoomEvent::UpdateBoard(Box::new(snapshot.clone())),
            game_over_event(&record),
        ];
        self.publish(&match_code, events, None).await;

        Ok(snapshot)
    }

    pub async fn abort(
        &self,
        raw_code: &str,
        connection_id: &str,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        ensure_in_play(&record)?;
        let now = self.clock.now();
        self.settle_pending_timeout(&mut record, now).await?;

        let player = requester(&record, connection_id)?;
        let result = MatchResult {
            outcome: ResultOutcome::Aborted,
            winner_color: None,
            reason: format!("{} aborted the match.", player.name),
            actor: Some(player.name.clone()),
        };
        record.conclude(MatchStatus::Aborted, result, now);
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!("{} aborted match {}", player.name, match_code);
        let snapshot = self.snapshot(&record)?;
        let events = vec![
            RoomEvent::Abort(AbortEvent {
                match_code: match_code.clone(),
                by: player.name.clone(),
            }),
            RoomEvent::UpdateBoard(Box::new(snapshot.clone())),
            game_over_event(&record),
        ];
        self.publish(&match_code, events, None).await;

        Ok(snapshot)
    }

    pub async fn offer_draw(
        &self,
        raw_code: &str,
        connection_id: &str,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        ensure_in_play(&record)?;
        let now = self.clock.now();
        self.settle_pending_timeout(&mut record, now).await?;

        let player = requester(&record, connection_id)?;
        if record.draw_offered_by == Some(player.color) {
            return Err(MatchServiceError::Conflict(
                "You have already requested a draw.".to_string(),
            ));
        }

        record.draw_offered_by = Some(player.color);
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        debug!("{} offered a draw in match {}", player.name, match_code);
        let request = RoomEvent::DrawRequest(DrawRequestEvent {
            match_code: match_code.clone(),
            from: player.name.clone(),
            color: player.color,
        });
        self.publish(&match_code, vec![request], Some(connection_id))
            .await;

        let snapshot = self.snapshot(&record)?;
        self.publish(
            &match_code,
            vec![RoomEvent::UpdateBoard(Box::new(snapshot.clone()))],
            None,
        )
        .await;

        Ok(snapshot)
    }

    pub async fn respond_to_draw(
        &self,
        raw_code: &str,
        connection_id: &str,
        accepted: bool,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;
        ensure_in_play(&record)?;
        let now = self.clock.now();
        self.settle_pending_timeout(&mut record, now).await?;

        let player = requester(&record, connection_id)?;
        match record.draw_offered_by {
            None => {
                return Err(MatchServiceError::Conflict(
                    "No active draw request.".to_string(),
                ))
            }
            Some(color) if color == player.color => {
                return Err(MatchServiceError::Conflict(
                    "You cannot accept your own draw request.".to_string(),
                ))
            }
            Some(_) => {}
        }

        if accepted {
            let result = MatchResult {
                outcome: ResultOutcome::Draw,
                winner_color: None,
                reason: format!("Draw accepted by {}.", player.name),
                actor: Some(player.name.clone()),
            };
            record.conclude(MatchStatus::Finished, result, now);
        } else {
            record.draw_offered_by = None;
        }
        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!(
            "{} {} the draw offer in match {}",
            player.name,
            if accepted { "accepted" } else { "declined" },
            match_code
        );
        let snapshot = self.snapshot(&record)?;
        let mut events = vec![
            RoomEvent::DrawAccepted(DrawAcceptedEvent {
                match_code: match_code.clone(),
                accepted,
                by: player.name.clone(),
            }),
            RoomEvent::UpdateBoard(Box::new(snapshot.clone())),
        ];
        if accepted {
            events.push(game_over_event(&record));
        }
        self.publish(&match_code, events, None).await;

        Ok(snapshot)
    }

    /// Host-only. Works in any status while the record exists and deletes it.
    pub async fn cancel_room(
        &self,
        raw_code: &str,
        connection_id: &str,
    ) -> Result<(), MatchServiceError> {
        let match_code = normalize_match_code(raw_code)?;

        let _guard = self.locks.lock(&match_code).await;
        let mut record = self.load(&match_code).await?;

        let player = requester(&record, connection_id)?;
        if !player.is_creator {
            return Err(MatchServiceError::Forbidden(
                "Only the room creator can cancel the match.".to_string(),
            ));
        }

        record.status = MatchStatus::Canceled;
        record.draw_offered_by = None;
        record.active_turn_started_at = None;
        self.repository.delete_match(&match_code).await?;

        info!("{} canceled match {}", player.name, match_code);
        let event = RoomEvent::CancelRoom(CancelRoomEvent {
            match_code: match_code.clone(),
            canceled_by: player.name,
            reason: None,
        });
        self.publish(&match_code, vec![event], None).await;
        self.evict(&match_code).await;

        Ok(())
    }

    /// Codes of waiting matches whose join window has closed.
    pub async fn expired_waiting_codes(&self) -> Result<Vec<String>, MatchServiceError> {
        let now = self.clock.now();
        Ok(self
            .repository
            .find_expired_waiting(now)
            .await?
            .into_iter()
            .map(|record| record.match_code)
            .collect())
    }

    /// Codes of active matches with a running clock.
    pub async fn running_clock_codes(&self) -> Result<Vec<String>, MatchServiceError> {
        Ok(self
            .repository
            .find_running_clocks()
            .await?
            .into_iter()
            .map(|record| record.match_code)
            .collect())
    }

    /// Deletes a waiting room whose join window closed. Returns false when
    /// the match changed since it was listed.
    pub async fn expire_waiting_room(&self, match_code: &str) -> Result<bool, MatchServiceError> {
        let _guard = self.locks.lock(match_code).await;

        let record = match self.repository.get_match(match_code).await? {
            Some(record) => record,
            None => return Ok(false),
        };
        if !record.join_window_elapsed(self.clock.now()) {
            return Ok(false);
        }

        self.repository.delete_match(match_code).await?;

        info!("Expired waiting room {}", match_code);
        let event = RoomEvent::CancelRoom(CancelRoomEvent {
            match_code: match_code.to_string(),
            canceled_by: SYSTEM_ACTOR.to_string(),
            reason: Some(ROOM_EXPIRED_REASON.to_string()),
        });
        self.publish(match_code, vec![event], None).await;
        self.evict(match_code).await;

        Ok(true)
    }

    /// Finishes the match on time if its running clock has flagged. Nothing
    /// is written when no timeout occurred.
    pub async fn enforce_clock(&self, match_code: &str) -> Result<Option<Color>, MatchServiceError> {
        let _guard = self.locks.lock(match_code).await;

        let mut record = match self.repository.get_match(match_code).await? {
            Some(record) if record.status == MatchStatus::Active => record,
            _ => return Ok(None),
        };

        let now = self.clock.now();
        let turn = self.rules.side_to_move(&record.position)?;
        let loser = match resolve_timeout(&mut record, turn, now) {
            Some(loser) => loser,
            None => return Ok(None),
        };

        record.updated_at = now;
        self.repository.save_match(&record).await?;

        info!("Match {} timed out for {}", match_code, loser);
        let events = vec![self.board_event(&record)?, game_over_event(&record)];
        self.publish(match_code, events, None).await;

        Ok(Some(loser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::match_repository::{InMemoryMatchRepository, MockMatchRepository};
    use crate::services::chess_service::ChessService;
    use crate::services::test_support::{ManualClock, RecordingBroadcaster, SequenceCodeGenerator};
    use chrono::Duration;
    use rstest::rstest;

    struct Harness {
        service: MatchService,
        repository: Arc<InMemoryMatchRepository>,
        broadcaster: Arc<RecordingBroadcaster>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(Utc::now());
        let repository = Arc::new(InMemoryMatchRepository::new(Arc::new(clock.clone())));
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = MatchService::new(
            repository.clone(),
            Arc::new(ChessService::new()),
            broadcaster.clone(),
            Arc::new(clock.clone()),
        )
        .with_code_generator(Arc::new(SequenceCodeGenerator::new(&["ABC123"])));

        Harness {
            service,
            repository,
            broadcaster,
            clock,
        }
    }

    fn create_request(name: &str) -> CreateMatchRequest {
        CreateMatchRequest {
            name: name.to_string(),
            time_control_key: None,
        }
    }

    fn join_request(name: &str, code: &str) -> JoinMatchRequest {
        JoinMatchRequest {
            name: name.to_string(),
            match_code: code.to_string(),
        }
    }

    /// Creates ABC123 with Alice (white, conn-a) and Bob (black, conn-b).
    async fn started_match(h: &Harness) {
        h.service.create_match(&create_request("Alice")).await.unwrap();
        h.service
            .join_match(&join_request("Bob", "ABC123"))
            .await
            .unwrap();

        let mut record = h.repository.get_match("ABC123").await.unwrap().unwrap();
        record.players[0].connection_id = Some("conn-a".to_string());
        record.players[0].connected = true;
        record.players[1].connection_id = Some("conn-b".to_string());
        record.players[1].connected = true;
        h.repository.save_match(&record).await.unwrap();
        h.broadcaster.clear();
    }

    async fn stored(h: &Harness) -> Match {
        h.repository.get_match("ABC123").await.unwrap().unwrap()
    }

    #[rstest]
    #[case("  Alice   Smith ", Some("Alice Smith"))]
    #[case("Al", Some("Al"))]
    #[case("A", None)]
    #[case("   ", None)]
    #[case("abcdefghijklmnopqrstuvwxy", None)]
    fn test_normalize_name(#[case] raw: &str, #[case] expected: Option<&str>) {
        let result = normalize_name(raw).ok();
        assert_eq!(result.as_deref(), expected);
    }

    #[rstest]
    #[case(" abc123 ", Some("ABC123"))]
    #[case("ABC12", None)]
    #[case("ABC-12", None)]
    #[case("ABC1234", None)]
    fn test_normalize_match_code(#[case] raw: &str, #[case] expected: Option<&str>) {
        let result = normalize_match_code(raw).ok();
        assert_eq!(result.as_deref(), expected);
    }

    #[test]
    fn test_normalize_time_control() {
        assert_eq!(normalize_time_control(None).unwrap().key, "rapid_15_10");
        assert_eq!(normalize_time_control(Some("")).unwrap().key, "rapid_15_10");
        assert_eq!(
            normalize_time_control(Some("rapid_10_5")).unwrap().initial_time_ms,
            600_000
        );
        assert_eq!(
            normalize_time_control(Some("blitz_3_2")),
            Err(MatchServiceError::ValidationError(
                "Invalid time control. Choose Rapid 15|10 or Rapid 10|5.".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_create_match() {
        let h = harness();

        let created = h
            .service
            .create_match(&CreateMatchRequest {
                name: " Alice ".to_string(),
                time_control_key: Some("rapid_10_5".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(created.match_code, "ABC123");
        assert_eq!(created.player_name, "Alice");
        assert_eq!(created.player_color, Color::White);
        assert_eq!(created.snapshot.status, MatchStatus::Waiting);
        assert_eq!(created.snapshot.white_time_ms, 600_000);

        let record = stored(&h).await;
        assert_eq!(record.players.len(), 1);
        assert_eq!(record.expires_at, h.clock.now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_create_match_retries_taken_codes() {
        let h = harness();
        let service = h
            .service
            .clone()
            .with_code_generator(Arc::new(SequenceCodeGenerator::new(&["ABC123", "ABC123", "XYZ789"])));

        service.create_match(&create_request("Alice")).await.unwrap();
        let second = service.create_match(&create_request("Bob")).await.unwrap();

        assert_eq!(second.match_code, "XYZ789");
    }

    #[tokio::test]
    async fn test_create_match_gives_up_after_attempts() {
        let h = harness();
        h.service.create_match(&create_request("Alice")).await.unwrap();

        let result = h.service.create_match(&create_request("Bob")).await;

        assert_eq!(result.unwrap_err(), MatchServiceError::Capacity);
    }

    #[tokio::test]
    async fn test_create_match_repository_failure() {
        let mut repository = MockMatchRepository::new();
        repository
            .expect_get_match()
            .returning(|_| Err(MatchRepositoryError::DynamoDb("unavailable".to_string())));
        let service = MatchService::new(
            Arc::new(repository),
            Arc::new(ChessService::new()),
            Arc::new(RecordingBroadcaster::default()),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let error = service
            .create_match(&create_request("Alice"))
            .await
            .unwrap_err();

        assert!(error.is_server_error());
        assert_eq!(error.client_message(), "Unexpected server error.");
    }

    #[tokio::test]
    async fn test_join_match_activates_and_starts_clock() {
        let h = harness();
        h.service.create_match(&create_request("Alice")).await.unwrap();
        h.clock.advance_ms(30_000);

        let joined = h
            .service
            .join_match(&join_request("Bob", "abc123"))
            .await
            .unwrap();

        assert_eq!(joined.player_color, Color::Black);
        assert!(!joined.is_rejoin);
        let record = stored(&h).await;
        assert_eq!(record.status, MatchStatus::Active);
        assert_eq!(record.active_turn_started_at, Some(h.clock.now()));
        assert_eq!(record.expires_at, h.clock.now() + Duration::hours(12));
        assert_eq!(h.broadcaster.event_names("ABC123"), vec!["updateBoard"]);
    }

    #[tokio::test]
    async fn test_rejoin_returns_existing_color() {
        let h = harness();
        started_match(&h).await;

        let rejoined = h
            .service
            .join_match(&join_request("ALICE", "ABC123"))
            .await
            .unwrap();

        assert!(rejoined.is_rejoin);
        assert_eq!(rejoined.player_color, Color::White);
        assert_eq!(rejoined.player_name, "Alice");
        assert_eq!(stored(&h).await.players.len(), 2);
    }

    #[tokio::test]
    async fn test_third_join_is_full() {
        let h = harness();
        started_match(&h).await;
        let before = stored(&h).await;

        let result = h.service.join_match(&join_request("Carol", "ABC123")).await;

        assert_eq!(result.unwrap_err(), MatchServiceError::Full);
        assert_eq!(stored(&h).await, before);
    }

    #[tokio::test]
    async fn test_join_availability_errors() {
        let h = harness();

        let missing = h.service.join_match(&join_request("Bob", "ZZZ999")).await;
        assert_eq!(missing.unwrap_err(), MatchServiceError::NotFound);

        h.service.create_match(&create_request("Alice")).await.unwrap();
        h.clock.advance_ms(10 * 60 * 1000 + 1_000);

        let expired = h.service.join_match(&join_request("Bob", "ABC123")).await;
        assert_eq!(
            expired.unwrap_err(),
            MatchServiceError::Gone("Match code expired. Please create a new match.".to_string())
        );
    }

    #[tokio::test]
    async fn test_join_finished_match_is_gone() {
        let h = harness();
        started_match(&h).await;
        h.service.resign("ABC123", "conn-a").await.unwrap();

        let result = h.service.join_match(&join_request("Carol", "ABC123")).await;

        assert_eq!(
            result.unwrap_err(),
            MatchServiceError::Gone("Match has already ended.".to_string())
        );
    }

    #[tokio::test]
    async fn test_move_applies_increment_to_mover() {
        let h = harness();
        started_match(&h).await;
        h.clock.advance_ms(5_000);

        let snapshot = h
            .service
            .make_move("ABC123", "conn-a", &MoveRequest::new("e2", "e4"))
            .await
            .unwrap();

        assert_eq!(snapshot.white_time_ms, 905_000);
        assert_eq!(snapshot.black_time_ms, 900_000);
        assert_eq!(snapshot.turn, Color::Black);
        assert_eq!(snapshot.move_history, vec!["e4".to_string()]);
        assert_eq!(snapshot.active_turn_started_at, Some(h.clock.now()));
        assert_eq!(h.broadcaster.event_names("ABC123"), vec!["updateBoard"]);
    }

    #[tokio::test]
    async fn test_move_rejections_leave_state_unchanged() {
        let h = harness();
        started_match(&h).await;
        let before = stored(&h).await;

        let wrong_turn = h
            .service
            .make_move("ABC123", "conn-b", &MoveRequest::new("e7", "e5"))
            .await;
        assert_eq!(
            wrong_turn.unwrap_err(),
            MatchServiceError::Conflict("Not your turn.".to_string())
        );

        let illegal = h
            .service
            .make_move("ABC123", "conn-a", &MoveRequest::new("e2", "e5"))
            .await;
        assert_eq!(illegal.unwrap_err(), MatchServiceError::IllegalMove);

        let stranger = h
            .service
            .make_move("ABC123", "conn-x", &MoveRequest::new("e2", "e4"))
            .await;
        assert_eq!(
            stranger.unwrap_err(),
            MatchServiceError::Forbidden("Socket is not registered in this match.".to_string())
        );

        assert_eq!(stored(&h).await, before);
        assert!(h.broadcaster.events("ABC123").is_empty());
    }

    #[tokio::test]
    async fn test_move_while_waiting() {
        let h = harness();
        h.service.create_match(&create_request("Alice")).await.unwrap();

        let result = h
            .service
            .make_move("ABC123", "conn-a", &MoveRequest::new("e2", "e4"))
            .await;

        assert_eq!(
            result.unwrap_err(),
            MatchServiceError::Conflict("Waiting for opponent to join.".to_string())
        );
    }

    #[tokio::test]
    async fn test_checkmate_finishes_without_increment() {
        let h = harness();
        started_match(&h).await;

        for (connection, from, to) in [
            ("conn-a", "f2", "f3"),
            ("conn-b", "e7", "e5"),
            ("conn-a", "g2", "g4"),
        ] {
            h.service
                .make_move("ABC123", connection, &MoveRequest::new(from, to))
                .await
                .unwrap();
        }
        h.broadcaster.clear();
        h.clock.advance_ms(2_000);

        let snapshot = h
            .service
            .make_move("ABC123", "conn-b", &MoveRequest::new("d8", "h4"))
            .await
            .unwrap();

        assert_eq!(snapshot.status, MatchStatus::Finished);
        assert!(snapshot.is_checkmate);
        assert_eq!(snapshot.black_time_ms, 908_000);
        assert!(snapshot.active_turn_started_at.is_none());
        let result = snapshot.result.unwrap();
        assert_eq!(result.outcome, ResultOutcome::Checkmate);
        assert_eq!(result.winner_color, Some(Color::Black));
        assert_eq!(result.reason, "black won by checkmate.");
        assert_eq!(
            h.broadcaster.event_names("ABC123"),
            vec!["updateBoard", "gameOver"]
        );
    }

    #[tokio::test]
    async fn test_flagged_clock_rejects_move_and_finishes_match() {
        let h = harness();
        started_match(&h).await;
        h.clock.advance_ms(900_000);

        let result = h
            .service
            .make_move("ABC123", "conn-a", &MoveRequest::new("e2", "e4"))
            .await;

        assert_eq!(result.unwrap_err(), MatchServiceError::Timeout);
        let record = stored(&h).await;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!(record.white_time_ms, 0);
        assert!(record.active_turn_started_at.is_none());
        let outcome = record.result.unwrap();
        assert_eq!(outcome.outcome, ResultOutcome::Timeout);
        assert_eq!(outcome.winner_color, Some(Color::Black));
        assert_eq!(
            h.broadcaster.event_names("ABC123"),
            vec!["updateBoard", "gameOver"]
        );
    }

    #[tokio::test]
    async fn test_flagged_clock_takes_precedence_over_resign() {
        let h = harness();
        started_match(&h).await;
        h.clock.advance_ms(901_000);

        let result = h.service.resign("ABC123", "conn-b").await;

        assert_eq!(result.unwrap_err(), MatchServiceError::Timeout);
        let outcome = stored(&h).await.result.unwrap();
        assert_eq!(outcome.outcome, ResultOutcome::Timeout);
        assert_eq!(outcome.reason, "Alice ran out of time.");
    }

    #[tokio::test]
    async fn test_resign() {
        let h = harness();
        started_match(&h).await;

        let snapshot = h.service.resign("ABC123", "conn-a").await.unwrap();

        let result = snapshot.result.unwrap();
        assert_eq!(snapshot.status, MatchStatus::Finished);
        assert_eq!(result.outcome, ResultOutcome::Resignation);
        assert_eq!(result.winner_color, Some(Color::Black));
        assert_eq!(result.reason, "Alice resigned.");
        assert_eq!(result.actor.as_deref(), Some("Alice"));

        let again = h.service.resign("ABC123", "conn-b").await;
        assert_eq!(
            again.unwrap_err(),
            MatchServiceError::Gone("Match has already ended.".to_string())
        );
    }

    #[tokio::test]
    async fn test_abort() {
        let h = harness();
        started_match(&h).await;

        let snapshot = h.service.abort("ABC123", "conn-b").await.unwrap();

        assert_eq!(snapshot.status, MatchStatus::Aborted);
        let result = snapshot.result.unwrap();
        assert_eq!(result.outcome, ResultOutcome::Aborted);
        assert_eq!(result.winner_color, None);
        assert_eq!(result.reason, "Bob aborted the match.");
        assert_eq!(
            h.broadcaster.event_names("ABC123"),
            vec!["abort", "updateBoard", "gameOver"]
        );
    }

    #[tokio::test]
    async fn test_draw_negotiation() {
        let h = harness();
        started_match(&h).await;

        let offered = h.service.offer_draw("ABC123", "conn-a").await.unwrap();
        assert_eq!(offered.draw_offered_by, Some(Color::White));

        let duplicate = h.service.offer_draw("ABC123", "conn-a").await;
        assert_eq!(
            duplicate.unwrap_err(),
            MatchServiceError::Conflict("You have already requested a draw.".to_string())
        );

        let own = h.service.respond_to_draw("ABC123", "conn-a", true).await;
        assert_eq!(
            own.unwrap_err(),
            MatchServiceError::Conflict("You cannot accept your own draw request.".to_string())
        );

        let declined = h
            .service
            .respond_to_draw("ABC123", "conn-b", false)
            .await
            .unwrap();
        assert_eq!(declined.draw_offered_by, None);
        assert_eq!(declined.status, MatchStatus::Active);

        let nothing = h.service.respond_to_draw("ABC123", "conn-b", true).await;
        assert_eq!(
            nothing.unwrap_err(),
            MatchServiceError::Conflict("No active draw request.".to_string())
        );

        h.service.offer_draw("ABC123", "conn-b").await.unwrap();
        let accepted = h
            .service
            .respond_to_draw("ABC123", "conn-a", true)
            .await
            .unwrap();
        assert_eq!(accepted.status, MatchStatus::Finished);
        let result = accepted.result.unwrap();
        assert_eq!(result.outcome, ResultOutcome::Draw);
        assert_eq!(result.reason, "Draw accepted by Alice.");
    }

    #[tokio::test]
    async fn test_draw_request_skips_offering_connection() {
        let h = harness();
        started_match(&h).await;

        h.service.offer_draw("ABC123", "conn-a").await.unwrap();

        let events = h.broadcaster.events("ABC123");
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, RoomEvent::DrawRequest(_)));
        assert_eq!(events[0].except.as_deref(), Some("conn-a"));
        assert!(matches!(events[1].event, RoomEvent::UpdateBoard(_)));
        assert_eq!(events[1].except, None);
    }

    #[tokio::test]
    async fn test_move_clears_draw_offer() {
        let h = harness();
        started_match(&h).await;
        h.service.offer_draw("ABC123", "conn-b").await.unwrap();

        let snapshot = h
            .service
            .make_move("ABC123", "conn-a", &MoveRequest::new("d2", "d4"))
            .await
            .unwrap();

        assert_eq!(snapshot.draw_offered_by, None);
    }

    #[tokio::test]
    async fn test_cancel_room() {
        let h = harness();
        started_match(&h).await;

        let not_host = h.service.cancel_room("ABC123", "conn-b").await;
        assert_eq!(
            not_host.unwrap_err(),
            MatchServiceError::Forbidden("Only the room creator can cancel the match.".to_string())
        );

        h.service.cancel_room("ABC123", "conn-a").await.unwrap();

        assert!(h.repository.get_match("ABC123").await.unwrap().is_none());
        assert_eq!(h.broadcaster.event_names("ABC123"), vec!["cancelRoom"]);
        assert_eq!(h.broadcaster.evicted(), vec!["ABC123".to_string()]);
        assert_eq!(
            h.service.find_snapshot("ABC123").await.unwrap_err(),
            MatchServiceError::NotFound
        );
    }

    #[tokio::test]
    async fn test_expire_waiting_room_revalidates() {
        let h = harness();
        h.service.create_match(&create_request("Alice")).await.unwrap();

        assert!(!h.service.expire_waiting_room("ABC123").await.unwrap());

        h.clock.advance_ms(10 * 60 * 1000 + 1_000);
        assert_eq!(
            h.service.expired_waiting_codes().await.unwrap(),
            vec!["ABC123".to_string()]
        );
        assert!(h.service.expire_waiting_room("ABC123").await.unwrap());
        assert!(h.repository.get_match("ABC123").await.unwrap().is_none());

        let events = h.broadcaster.events("ABC123");
        match &events[0].event {
            RoomEvent::CancelRoom(cancel) => {
                assert_eq!(cancel.canceled_by, "system");
                assert_eq!(cancel.reason.as_deref(), Some(ROOM_EXPIRED_REASON));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enforce_clock_writes_only_on_timeout() {
        let h = harness();
        started_match(&h).await;
        h.clock.advance_ms(450_000);
        let before = stored(&h).await;

        assert_eq!(h.service.enforce_clock("ABC123").await.unwrap(), None);
        assert_eq!(stored(&h).await, before);

        h.clock.advance_ms(450_000);
        assert_eq!(
            h.service.enforce_clock("ABC123").await.unwrap(),
            Some(Color::White)
        );
        assert_eq!(stored(&h).await.status, MatchStatus::Finished);

        // A second pass sees a finished match and does nothing.
        assert_eq!(h.service.enforce_clock("ABC123").await.unwrap(), None);
        assert_eq!(
            h.broadcaster.event_names("ABC123"),
            vec!["updateBoard", "gameOver"]
        );
    }
}
