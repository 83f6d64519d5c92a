//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use state_store::StateStore;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Completed restocks waiting for the dispatcher, when the store answered.
    pub pending_deliveries: Option<u64>,
}

/// GET /health: reports `ok` while the state store answers, `degraded`
/// with 503 otherwise.
pub async fn check<S: StateStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.runtime.dispatcher().pending().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                pending_deliveries: Some(pending),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the state store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    pending_deliveries: None,
                }),
            )
        }
    }
}
