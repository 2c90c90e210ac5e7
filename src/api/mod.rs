mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::contracts::IdAllocator;

pub use handlers::{
    AllocateQuery, ApiError, AppState, BlockIdResponse, ErrorResponse, SingleIdResponse,
    StatsResponse,
};

/// Creates the API router.
pub fn create_router<A: IdAllocator + 'static>(state: Arc<AppState<A>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_ready::<A>))
        .route("/stats", get(handlers::get_stats::<A>))
        .route("/metrics", get(handlers::metrics::<A>))
        .route("/v1/id", post(handlers::allocate_ids::<A>))
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Starts the HTTP server and serves until `shutdown` resolves.
pub async fn start_server<A, F>(
    config: ServerConfig,
    state: Arc<AppState<A>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    A: IdAllocator + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
