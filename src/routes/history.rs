// src/routes/history.rs
//! History endpoints: `/api/history` and `/api/latest`.
//!
//! Both read the history file through the shared [`HistoryReader`] and accept
//! an optional `client` code (scopes entries to that client's site) and, for
//! `/api/history`, a `limit`. Exports a subrouter to the gateway (`mod.rs`).
//!
//! [`HistoryReader`]: crate::HistoryReader

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, response::Response,
    routing::get, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::AppState;
use crate::{ClientDirectory, HistoryEntry};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/history", get(history))
        .route("/api/latest", get(latest))
}

/// Query parameters shared by the history endpoints.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Client code; restricts entries to that client's site.
    client: Option<String>,
    limit: Option<usize>,
}

async fn history(
    Query(params): Query<HistoryQuery>,
    State((reader, clients)): State<AppState>,
) -> impl IntoResponse {
    // ---
    let site = match resolve_site(&clients, params.client.as_deref()) {
        Ok(site) => site,
        Err(response) => return response,
    };

    let entries = apply_filters(reader.entries().await, site, params.limit);
    info!("GET /api/history - returning {} entries", entries.len());
    (StatusCode::OK, Json(entries)).into_response()
}

async fn latest(
    Query(params): Query<HistoryQuery>,
    State((reader, clients)): State<AppState>,
) -> impl IntoResponse {
    // ---
    let site = match resolve_site(&clients, params.client.as_deref()) {
        Ok(site) => site,
        Err(response) => return response,
    };

    match apply_filters(reader.entries().await, site, Some(1)).into_iter().next() {
        Some(entry) => (StatusCode::OK, Json(entry)).into_response(),
        None => {
            debug!("GET /api/latest - no history yet");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no history yet" })),
            )
                .into_response()
        }
    }
}

// ---

/// Map an optional client code to its site; unknown codes are a 404.
fn resolve_site<'a>(
    clients: &'a ClientDirectory,
    code: Option<&str>,
) -> Result<Option<&'a str>, Response> {
    // ---
    let Some(code) = code else {
        return Ok(None);
    };
    match clients.site_for(code) {
        Some(site) => Ok(Some(site)),
        None => {
            info!("Unknown client code requested");
            Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "unknown client code" })),
            )
                .into_response())
        }
    }
}

/// Apply site and limit filters, preserving newest-first order.
fn apply_filters(
    entries: Vec<HistoryEntry>,
    site: Option<&str>,
    limit: Option<usize>,
) -> Vec<HistoryEntry> {
    // ---
    entries
        .into_iter()
        .filter(|e| site.map_or(true, |site| e.site() == Some(site)))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
