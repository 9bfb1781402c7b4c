//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::{info, instrument};

use crate::error::{QuizError, Result};
use crate::groq::{AVAILABLE_MODELS, DEFAULT_MODEL};
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// Hard caps from the API contract: search and article-batch limits.
const MAX_SEARCH_LIMIT: u32 = 20;
const MAX_ARTICLES_LIMIT: u32 = 10;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
    Json(HealthOut {
        status: "OK",
        message: "Server is running",
        environment: state.environment.clone(),
        groq_configured: state.groq.is_some(),
        database_ready: state.storage.is_some(),
    })
}

#[instrument(level = "info")]
pub async fn http_models() -> Json<ModelsOut> {
    Json(ModelsOut {
        models: AVAILABLE_MODELS.to_vec(),
        recommended: DEFAULT_MODEL,
        current_default: DEFAULT_MODEL,
    })
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic, enhanced = body.wikipedia_enhanced))]
pub async fn http_generate_quiz(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateQuizIn>,
) -> Result<Json<QuizOut>> {
    let (quiz, context) = logic::generate_quiz(&state, body).await?;
    info!(target: "quiz", id = %quiz.id, source = quiz.source.as_str(), "HTTP quiz served");
    Ok(Json(to_out(&quiz, context)))
}

#[instrument(level = "info", skip(state, body), fields(quiz_id = %body.quiz_id, answer_count = body.answers.len()))]
pub async fn http_submit_quiz(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitQuizIn>,
) -> Result<Json<crate::domain::QuizResult>> {
    let result = logic::grade_submission(&state, &body.quiz_id, &body.answers).await?;
    info!(
        target: "quiz",
        quiz_id = %body.quiz_id,
        score = result.score,
        percentage = result.percentage,
        "HTTP submission graded"
    );
    Ok(Json(result))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quiz_results(State(state): State<Arc<AppState>>) -> Json<ResultsOut> {
    let results = state.results.read().await.clone();
    Json(ResultsOut {
        total: results.len(),
        results,
    })
}

#[instrument(level = "info", skip(state), fields(skip = q.skip, limit = q.limit))]
pub async fn http_quiz_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<QuizHistoryItem>>> {
    let skip = q.skip.unwrap_or(0);
    let limit = q.limit.unwrap_or(100);
    let items = logic::quiz_history(&state, skip, limit).await?;
    Ok(Json(items))
}

#[instrument(level = "info", skip(state), fields(%quiz_id))]
pub async fn http_quiz_detail(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<Json<QuizDetailOut>> {
    let detail = logic::quiz_detail(&state, &quiz_id).await?;
    Ok(Json(detail))
}

#[instrument(level = "info", skip(state))]
pub async fn http_score_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<crate::domain::ScoreStats>> {
    let stats = logic::score_stats(&state).await?;
    Ok(Json(stats))
}

#[instrument(level = "info", skip(state, q), fields(query_len = q.query.len()))]
pub async fn http_wiki_search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WikiSearchQuery>,
) -> Result<Json<WikiSearchOut>> {
    if q.query.trim().is_empty() {
        return Err(QuizError::invalid("Search query is required"));
    }
    let limit = q.limit.unwrap_or(5).clamp(1, MAX_SEARCH_LIMIT);
    let results = state.wikipedia.search(&q.query, limit).await;
    Ok(Json(WikiSearchOut {
        total: results.len(),
        results,
    }))
}

#[instrument(level = "info", skip(state), fields(%title))]
pub async fn http_wiki_article(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Json<ArticleOut>> {
    match state.wikipedia.article(&title).await {
        Some(article) => Ok(Json(article)),
        None => Err(QuizError::NotFound(format!("article '{title}'"))),
    }
}

#[instrument(level = "info", skip(state, body), fields(content_len = body.content.len()))]
pub async fn http_fact_check(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FactCheckIn>,
) -> Result<Json<FactCheckOut>> {
    if body.content.trim().is_empty() {
        return Err(QuizError::invalid("Content is required"));
    }
    let check = state
        .wikipedia
        .fact_check(&body.content, body.topic.as_deref())
        .await;
    info!(
        target: "wikipedia",
        found = check.found,
        score = check.relevance_score,
        "HTTP fact-check served"
    );
    Ok(Json(check))
}

#[instrument(level = "info", skip(state, q), fields(topic = %q.topic))]
pub async fn http_wiki_articles(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WikiArticlesQuery>,
) -> Result<Json<Vec<ArticleOut>>> {
    if q.topic.trim().is_empty() {
        return Err(QuizError::invalid("Topic is required"));
    }
    let limit = q.limit.unwrap_or(3).clamp(1, MAX_ARTICLES_LIMIT);
    let hits = state.wikipedia.search(&q.topic, limit).await;

    let mut articles = Vec::new();
    for hit in hits {
        if let Some(article) = state.wikipedia.article(&hit.title).await {
            articles.push(article);
        }
    }
    Ok(Json(articles))
}
