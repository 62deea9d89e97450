pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use shared::{
    repositories::match_repository::MatchRepository,
    services::{chess_service::ChessService, clock_service::Clock, match_service::MatchService},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use websocket_api::RoomHub;

use config::CorsOrigins;
use state::AppState;

/// Wires the match service to a fresh room hub so socket broadcasts and
/// HTTP requests share one view of every match.
pub fn build_state(
    repository: Arc<dyn MatchRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
) -> AppState {
    let hub = RoomHub::new();
    let match_service = MatchService::new(
        repository,
        Arc::new(ChessService::new()),
        Arc::new(hub.clone()),
        clock,
    );

    AppState {
        match_service: Arc::new(match_service),
        hub,
    }
}

pub fn build_router(state: AppState, origins: &CorsOrigins) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::matches::routes())
        .merge(websocket_api::routes())
        .layer(cors_layer(origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(parsed))
        }
    }
}
