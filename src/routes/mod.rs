// src/routes/mod.rs
//! Gateway for the read-only HTTP API.
//!
//! Follows the Explicit Module Boundary Pattern (EMBP): each sibling module
//! owns its handlers and exports a subrouter, and this gateway merges them and
//! attaches the shared state. `main.rs` only sees [`router`].

use std::sync::Arc;

use axum::Router;

use crate::{ClientDirectory, HistoryReader};

mod health;
mod history;

// ---

/// Shared, read-only state for every route.
pub type AppState = (HistoryReader, Arc<ClientDirectory>);

pub fn router(reader: HistoryReader, clients: ClientDirectory) -> Router {
    // ---
    Router::new()
        .merge(history::router())
        .merge(health::router())
        .with_state((reader, Arc::new(clients)))
}
