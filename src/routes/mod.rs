//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // Health + models
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/models", get(http::http_models))
        // Quiz API
        .route("/api/v1/quiz/generate", post(http::http_generate_quiz))
        .route("/api/v1/quiz/submit", post(http::http_submit_quiz))
        .route("/api/v1/quiz/results", get(http::http_quiz_results))
        .route("/api/v1/quiz/history", get(http::http_quiz_history))
        .route("/api/v1/quiz/history/:quiz_id", get(http::http_quiz_detail))
        .route("/api/v1/quiz/stats", get(http::http_score_stats))
        // Wikipedia API
        .route("/api/v1/wikipedia/search", get(http::http_wiki_search))
        .route("/api/v1/wikipedia/article/:title", get(http::http_wiki_article))
        .route("/api/v1/wikipedia/fact-check", post(http::http_fact_check))
        .route("/api/v1/wikipedia/articles", get(http::http_wiki_articles))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
