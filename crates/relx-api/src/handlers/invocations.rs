//! Prediction handler
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use relx_pipeline::Prediction;

use crate::error::AppError;
use crate::state::AppState;

/// Invocation request body
#[derive(Debug, Deserialize)]
pub struct InvocationRequest {
    /// Document locators: HTML files or directories of them
    pub filenames: Vec<PathBuf>,
}

/// Invocation response body
#[derive(Debug, Serialize)]
pub struct InvocationResponse {
    pub predictions: Vec<Prediction>,
}

/// Run the prediction pipeline over the requested locators
///
/// The facade is not reentrant, so invocations are serialized on its lock
/// and executed on the blocking pool.
pub async fn invocations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvocationRequest>,
) -> Result<Json<InvocationResponse>, AppError> {
    if req.filenames.is_empty() {
        return Err(AppError::BadRequest("filenames must not be empty".to_string()));
    }
    let facade = state
        .facade()
        .ok_or_else(|| AppError::Unavailable("model is not loaded".to_string()))?;

    let count = req.filenames.len();
    let predictions = tokio::task::spawn_blocking(move || {
        let mut facade = facade.blocking_lock();
        facade.predict(&req.filenames)
    })
    .await??;

    info!(
        locators = count,
        relations = predictions.iter().map(|p| p.relations.len()).sum::<usize>(),
        "Invocation served"
    );
    Ok(Json(InvocationResponse { predictions }))
}
