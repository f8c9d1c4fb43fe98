//! RELX API - HTTP prediction endpoint
//!
//! Serves the model-hosting contract: `GET /ping`, `GET /health` and
//! `POST /invocations`.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, invocations};
use crate::state::AppState;

/// Build the router over shared state
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_size;

    Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        .route("/invocations", post(invocations::invocations))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process stops
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("RELX API server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
