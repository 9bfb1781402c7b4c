//! Public request/response DTOs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    FactCheck, Quiz, QuizQuestion, QuizSource, SearchHit, SubmissionRow, WikiArticle,
    WikipediaContext,
};

//
// Quiz generation
//

#[derive(Debug, Deserialize)]
pub struct GenerateQuizIn {
    pub topic: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, rename = "wikipediaEnhanced")]
    pub wikipedia_enhanced: bool,
    #[serde(default, rename = "enhancedPrompt")]
    pub enhanced_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub quiz_id: String,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
    pub generated_at: DateTime<Utc>,
    pub source: QuizSource,
    pub wikipedia_enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia_context: Option<WikipediaContext>,
}

/// Convert the internal quiz (plus any assembled context) to the public DTO.
pub fn to_out(quiz: &Quiz, context: Option<WikipediaContext>) -> QuizOut {
    QuizOut {
        quiz_id: quiz.id.clone(),
        topic: quiz.topic.clone(),
        questions: quiz.questions.clone(),
        generated_at: quiz.generated_at,
        source: quiz.source.clone(),
        wikipedia_enhanced: quiz.wikipedia_enhanced,
        wikipedia_context: context,
    }
}

//
// Submission / results
//

#[derive(Debug, Deserialize)]
pub struct SubmitQuizIn {
    pub quiz_id: String,
    pub answers: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct ResultsOut {
    pub results: Vec<crate::domain::QuizResult>,
    pub total: usize,
}

//
// History
//

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct QuizHistoryItem {
    pub id: String,
    pub topic: String,
    pub model: String,
    pub temperature: f32,
    pub created_at: DateTime<Utc>,
    pub question_count: u32,
    pub submission_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    pub wikipedia_enhanced: bool,
}

#[derive(Debug, Serialize)]
pub struct QuizDetailOut {
    pub id: String,
    pub topic: String,
    pub model: String,
    pub temperature: f32,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuizQuestion>,
    pub submissions: Vec<SubmissionRow>,
    pub total_submissions: usize,
}

//
// Wikipedia
//

#[derive(Debug, Deserialize)]
pub struct WikiSearchQuery {
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct WikiSearchOut {
    pub results: Vec<SearchHit>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct FactCheckIn {
    pub content: String,
    #[serde(default)]
    pub topic: Option<String>,
}

pub type FactCheckOut = FactCheck;
pub type ArticleOut = WikiArticle;

#[derive(Debug, Deserialize)]
pub struct WikiArticlesQuery {
    pub topic: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

//
// Health / models
//

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub message: &'static str,
    pub environment: String,
    pub groq_configured: bool,
    pub database_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsOut {
    pub models: Vec<&'static str>,
    pub recommended: &'static str,
    pub current_default: &'static str,
}
