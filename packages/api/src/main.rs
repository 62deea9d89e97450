use std::sync::Arc;

use api::{
    build_router, build_state,
    config::{MatchStore, ServerConfig},
};
use shared::{
    repositories::match_repository::{
        DynamoDbMatchRepository, InMemoryMatchRepository, MatchRepository,
    },
    services::{
        clock_service::{Clock, SystemClock},
        expiry_sweeper::ExpirySweeper,
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repository: Arc<dyn MatchRepository + Send + Sync> = match &config.match_store {
        MatchStore::Memory => {
            info!("Using in-memory match store");
            Arc::new(InMemoryMatchRepository::new(clock.clone()))
        }
        MatchStore::DynamoDb { table_name } => {
            info!("Using DynamoDB match store (table {})", table_name);
            let aws_config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&aws_config);
            Arc::new(DynamoDbMatchRepository::new(client, table_name.clone()))
        }
    };

    let state = build_state(repository, clock);
    let sweeper = ExpirySweeper::new(state.match_service.as_ref().clone())
        .with_intervals(config.room_sweep_interval, config.clock_sweep_interval)
        .spawn();

    let app = build_router(state, &config.cors_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}
