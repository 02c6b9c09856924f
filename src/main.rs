//! Application entry point for the `building-pulse` service.
//!
//! This binary orchestrates the full startup sequence for the building
//! diagnostics pipeline, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the history file and the client directory
//! - Spawning the publisher loop (synthesize -> analyze -> store, once per interval)
//! - Mounting the read-only API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving until Ctrl-C
//!
//! # Environment Variables
//! - `OPENAI_API_KEY` (**required**) – text-generation credential
//! - `PULSE_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `PULSE_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the rest. This module follows the Explicit Module
//! Boundary Pattern (EMBP) by delegating configuration parsing to `config`,
//! the pipeline to `publisher`, and route registration to `routes`.
use std::{env, net::SocketAddr};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod analyzer;
mod clients;
mod config;
mod models;
mod publisher;
mod routes;
mod store;
mod synthesizer;

// These are not used here but they are imported to be used by routes/*.rs, that way
// refactoring is easier since routes/*.rs do not have knowledge of store.rs or
// clients.rs, only of their parent module (main.rs)
pub use clients::ClientDirectory;
pub use models::HistoryEntry;
pub use store::HistoryReader;

use analyzer::{Analyzer, OpenAiClient};
use publisher::Publisher;
use store::HistoryStore;
use synthesizer::TelemetrySynthesizer;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let clients = ClientDirectory::load(cfg.clients_file.as_deref())?;
    if clients.is_empty() {
        tracing::info!("No client codes configured; history is served unfiltered only");
    }

    let generator = OpenAiClient::new(
        &cfg.api_base_url,
        cfg.api_key.clone(),
        cfg.model.clone(),
        cfg.llm_timeout,
    )?;
    let publisher = Publisher::new(
        TelemetrySynthesizer::new(cfg.site_id.clone()),
        Analyzer::new(Box::new(generator), cfg.llm_timeout),
        HistoryStore::load(&cfg.history_file, cfg.history_max),
        cfg.cycle_interval,
    );

    let (stop, stopped) = watch::channel(false);
    let worker = tokio::spawn(publisher.run(stopped));

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(HistoryReader::new(&cfg.history_file), clients);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The publisher only observes this between cycles.
    let _ = stop.send(true);
    let cycles = worker.await?;
    tracing::info!("Shut down after {} publisher cycles", cycles);

    Ok(())
}

// ---

async fn shutdown_signal() {
    // ---
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
        Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `PULSE_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, or else the `PULSE_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("PULSE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to PULSE_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PULSE_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
