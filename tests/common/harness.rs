use chrono::Utc;
use shared::models::requests::{AttachRequest, CreateMatchRequest, MoveRequest};
use shared::models::snapshot::MatchSnapshot;
use shared::repositories::match_repository::InMemoryMatchRepository;
use shared::services::chess_service::ChessService;
use shared::services::errors::match_service_errors::MatchServiceError;
use shared::services::expiry_sweeper::ExpirySweeper;
use shared::services::match_service::MatchService;
use shared::services::test_support::{ManualClock, RecordingBroadcaster, SequenceCodeGenerator};
use std::sync::Arc;

pub const WHITE_CONN: &str = "conn-white";
pub const BLACK_CONN: &str = "conn-black";

/// A match service on an in-memory store, a recording broadcaster and a
/// clock the test moves by hand.
pub struct Harness {
    pub service: MatchService,
    pub repository: Arc<InMemoryMatchRepository>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(codes: &[&str]) -> Self {
        let clock = ManualClock::new(Utc::now());
        let repository = Arc::new(InMemoryMatchRepository::new(Arc::new(clock.clone())));
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = MatchService::new(
            repository.clone(),
            Arc::new(ChessService::new()),
            broadcaster.clone(),
            Arc::new(clock.clone()),
        )
        .with_code_generator(Arc::new(SequenceCodeGenerator::new(codes)));

        Harness {
            service,
            repository,
            broadcaster,
            clock,
        }
    }

    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.service.clone())
    }

    pub async fn create(&self, name: &str, time_control_key: Option<&str>) -> String {
        self.service
            .create_match(&CreateMatchRequest {
                name: name.to_string(),
                time_control_key: time_control_key.map(str::to_string),
            })
            .await
            .unwrap()
            .match_code
    }

    pub async fn attach(&self, code: &str, name: &str, connection_id: &str) -> MatchSnapshot {
        self.service
            .attach_session(&AttachRequest {
                match_code: code.to_string(),
                name: name.to_string(),
                connection_id: connection_id.to_string(),
                allow_auto_join_second: true,
            })
            .await
            .unwrap()
            .state
    }

    /// Alice (white) and Bob (black) both seated and connected; the clock
    /// is running for white.
    pub async fn seated(&self, time_control_key: Option<&str>) -> String {
        let code = self.create("Alice", time_control_key).await;
        self.attach(&code, "Alice", WHITE_CONN).await;
        self.attach(&code, "Bob", BLACK_CONN).await;
        self.broadcaster.clear();
        code
    }

    pub async fn play(
        &self,
        code: &str,
        connection_id: &str,
        from: &str,
        to: &str,
    ) -> Result<MatchSnapshot, MatchServiceError> {
        self.service
            .make_move(code, connection_id, &MoveRequest::new(from, to))
            .await
    }
}
