//! Delivery control endpoints.
//!
//! POST /api/v1/start    - start a delivery run
//! POST /api/v1/stop     - stop the current run
//! GET  /api/v1/status   - loop counters and pool health
//! GET  /api/v1/sessions - per-session health and delivery counters

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use convoy_types::status::{DeliveryStatus, SessionStatusInfo, StartOutcome};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Result of a stop request.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    /// `false` when no run was active.
    pub stopped: bool,
}

/// POST /api/v1/start - Load configuration and start delivering.
///
/// Returns as soon as configuration is loaded; sessions are created in the
/// background. Configuration problems are reported as `400 CONFIG_ERROR`.
pub async fn start(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StartOutcome>>, AppError> {
    let started = Instant::now();
    let outcome = state.engine.start().await?;

    Ok(Json(
        ApiResponse::success(outcome, started).with_link("status", "/api/v1/status"),
    ))
}

/// POST /api/v1/stop - Stop the delivery loop at the next tick boundary.
pub async fn stop(State(state): State<AppState>) -> Json<ApiResponse<StopResponse>> {
    let started = Instant::now();
    let stopped = state.engine.stop().await;
    Json(ApiResponse::success(StopResponse { stopped }, started))
}

/// GET /api/v1/status - Read-only loop status.
pub async fn status(State(state): State<AppState>) -> Json<ApiResponse<DeliveryStatus>> {
    let started = Instant::now();
    let status = state.engine.status().await;
    Json(ApiResponse::success(status, started).with_link("sessions", "/api/v1/sessions"))
}

/// GET /api/v1/sessions - Every session of the current pool, by index.
pub async fn sessions(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<SessionStatusInfo>>> {
    let started = Instant::now();
    let sessions = state.engine.sessions().await;
    Json(ApiResponse::success(sessions, started))
}
