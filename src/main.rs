//! Quizgen · AI Quiz Generator Backend
//!
//! - Axum HTTP API (quiz generation, grading, history, Wikipedia enrichment)
//! - Optional Groq integration (via environment variables)
//! - libSQL persistence for quizzes and attempts
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   GROQ_API_KEY     : enables model-backed generation if present
//!   GROQ_BASE_URL    : default "https://api.groq.com/openai/v1"
//!   QUIZ_DB_PATH     : libSQL database path (default ./data/quizgen.db)
//!   QUIZ_CONFIG_PATH : path to TOML config (prompts + optional quiz bank)
//!   ENVIRONMENT      : reported by /api/v1/health (default "development")
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod config;
mod domain;
mod enrich;
mod error;
mod groq;
mod logic;
mod migrations;
mod protocol;
mod relevance;
mod routes;
mod seeds;
mod state;
mod storage;
mod telemetry;
mod util;
mod wikipedia;

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Build shared application state (stores, Groq client, Wikipedia client).
    let state = Arc::new(AppState::new().await?);

    // Build the HTTP router with routes, CORS and tracing layers.
    let app = build_router(state.clone());

    // Read port from env or default to 3000.
    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "quizgen_backend", %addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
