// src/routes/health.rs
//! Service health endpoint.
//!
//! `/health` answers as long as the HTTP layer is up and reports what the
//! publisher last wrote, so an orchestrator or a human can tell a live but
//! failing pipeline (every cycle erroring) from a healthy one.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    /// Timestamp of the newest history entry, if any.
    last_cycle: Option<String>,
    /// Whether the newest entry recorded a failed cycle.
    last_cycle_failed: bool,
}

/// Handle `GET /health`.
///
/// Reads the history file only; never touches the text-generation service.
async fn health(State((reader, _)): State<AppState>) -> Json<HealthResponse> {
    // ---
    let latest = reader.latest().await;
    Json(HealthResponse {
        status: "ok",
        last_cycle_failed: latest.as_ref().is_some_and(|e| e.error.is_some()),
        last_cycle: latest.map(|e| e.timestamp),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
