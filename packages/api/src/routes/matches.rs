use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared::models::{
    requests::{CreateMatchRequest, JoinMatchRequest},
    responses::{CreateMatchResponse, JoinMatchResponse},
    snapshot::MatchSnapshot,
    time_control::TimeControl,
};
use tracing::info;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-match", post(create_match))
        .route("/join-match", post(join_match))
        .route("/matches/{code}", get(get_match))
        .route("/time-controls", get(list_time_controls))
}

/// `{"ok": true, ...body}`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Success<T> {
    fn new(body: T) -> Json<Self> {
        Json(Success { ok: true, body })
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotBody {
    pub snapshot: MatchSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControlsBody {
    pub time_controls: Vec<TimeControl>,
}

async fn create_match(
    State(state): State<AppState>,
    payload: Result<Json<CreateMatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Success<CreateMatchResponse>>), ApiError> {
    let Json(request) = payload?;

    let created = state.match_service.create_match(&request).await?;
    info!("Created match {} for {}", created.match_code, created.player_name);

    Ok((StatusCode::CREATED, Success::new(created)))
}

async fn join_match(
    State(state): State<AppState>,
    payload: Result<Json<JoinMatchRequest>, JsonRejection>,
) -> Result<Json<Success<JoinMatchResponse>>, ApiError> {
    let Json(request) = payload?;

    let joined = state.match_service.join_match(&request).await?;

    Ok(Success::new(joined))
}

async fn get_match(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Success<SnapshotBody>>, ApiError> {
    let snapshot = state.match_service.find_snapshot(&code).await?;

    Ok(Success::new(SnapshotBody { snapshot }))
}

async fn list_time_controls() -> Json<Success<TimeControlsBody>> {
    Success::new(TimeControlsBody {
        time_controls: TimeControl::presets(),
    })
}
