//! Domain models used by the backend: quizzes, questions, graded attempts,
//! score statistics, and Wikipedia records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where did a served quiz come from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuizSource {
    Generated, // produced by the model and cached
    LocalBank, // from user-provided TOML bank
    Seed,      // built-in fallback (last resort)
}

impl QuizSource {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizSource::Generated => "generated",
            QuizSource::LocalBank => "local_bank",
            QuizSource::Seed => "seed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "local_bank" => QuizSource::LocalBank,
            "seed" => QuizSource::Seed,
            _ => QuizSource::Generated,
        }
    }
}

/// A single multiple-choice question. `correct_answer` indexes into `options`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

/// A generated quiz with its questions, as held in memory and served to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub topic: String,
    pub model: String,
    pub temperature: f32,
    pub wikipedia_enhanced: bool,
    pub source: QuizSource,
    pub questions: Vec<QuizQuestion>,
    pub generated_at: DateTime<Utc>,
}

/// Quiz row without its questions, as stored and listed.
#[derive(Clone, Debug, Serialize)]
pub struct QuizMeta {
    pub id: String,
    pub topic: String,
    pub model: String,
    pub temperature: f32,
    pub wikipedia_enhanced: bool,
    pub source: QuizSource,
    pub created_at: DateTime<Utc>,
}

/// One graded attempt at a quiz.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: String,
    pub topic: String,
    pub user_answers: Vec<usize>,
    pub correct_answers: Vec<usize>,
    pub score: usize,
    pub total_questions: usize,
    pub percentage: f32,
    pub submitted_at: DateTime<Utc>,
    pub feedback: Vec<String>,
}

/// A stored submission row (individual answers are not persisted).
#[derive(Clone, Debug, Serialize)]
pub struct SubmissionRow {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub score: usize,
    pub total_questions: usize,
    pub percentage: f32,
    pub submitted_at: DateTime<Utc>,
}

/// Rolling performance statistics over recorded attempts.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScoreStats {
    pub total_attempts: usize,
    pub average_percentage: f32,
    pub best_percentage: f32,
    pub worst_percentage: f32,
    /// Most recent attempt percentages, newest first.
    pub recent: Vec<f32>,
}

/// A Wikipedia search hit (cleaned snippet, canonical article URL).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub pageid: u64,
    pub url: String,
}

/// A fetched Wikipedia article summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WikiArticle {
    pub title: String,
    pub extract: String,
    pub url: String,
    pub pageid: u64,
    pub lastrevid: u64,
    pub sections: Vec<String>,
}

/// How much the relevance scorer trusts a match.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Outcome of the fact-check pipeline for a piece of content.
#[derive(Clone, Debug, Serialize)]
pub struct FactCheck {
    pub query: String,
    pub found: bool,
    pub article: Option<WikiArticle>,
    pub search_results: Vec<SearchHit>,
    pub confidence: Confidence,
    pub relevance_score: f32,
}

impl FactCheck {
    /// The "nothing usable found" outcome.
    pub fn miss(query: &str) -> Self {
        Self {
            query: query.to_string(),
            found: false,
            article: None,
            search_results: Vec::new(),
            confidence: Confidence::Low,
            relevance_score: 0.0,
        }
    }
}

/// Assembled encyclopedia context injected into enhanced generation prompts.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WikipediaContext {
    pub articles: Vec<WikiArticle>,
    pub key_facts: Vec<String>,
    pub related_topics: Vec<String>,
    pub summary: String,
}

impl WikipediaContext {
    /// True when no trusted article made it into the context.
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
