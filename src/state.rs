//! Application state: stores, optional Groq client, Wikipedia client, prompts.
//!
//! This module owns:
//!   - the in-memory quiz cache (always populated; the fallback when the
//!     database is missing)
//!   - the process-lifetime results log
//!   - the optional libSQL storage handle
//!   - the prompts struct (from TOML or defaults) and the local quiz bank
//!   - optional Groq client, always-on Wikipedia client

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_quiz_config_from_env, Prompts};
use crate::domain::{Quiz, QuizResult, QuizSource};
use crate::error::Result;
use crate::groq::{Groq, DEFAULT_MODEL};
use crate::storage::Storage;
use crate::wikipedia::Wikipedia;

const DEFAULT_DB_PATH: &str = "./data/quizgen.db";

/// User id recorded for unauthenticated attempts.
pub const ANON_USER: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub quizzes: Arc<RwLock<HashMap<String, Quiz>>>,
    pub results: Arc<RwLock<Vec<QuizResult>>>,
    pub storage: Option<Arc<Storage>>,
    pub groq: Option<Groq>,
    pub wikipedia: Wikipedia,
    pub prompts: Prompts,
    pub bank: Vec<Quiz>,
    pub environment: String,
}

impl AppState {
    /// Build state from env: load config, validate the bank, open storage,
    /// init clients.
    #[instrument(level = "info", skip_all)]
    pub async fn new() -> Result<Self> {
        let cfg = load_quiz_config_from_env().unwrap_or_default();
        let prompts = cfg.prompts.clone();

        // Validate bank entries the same way generated quizzes are validated;
        // malformed entries are skipped, not fatal.
        let mut bank = Vec::new();
        for entry in cfg.quizzes {
            let id = entry.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let bad = entry
                .questions
                .iter()
                .any(|q| q.options.len() != 4 || q.correct_answer >= q.options.len());
            if entry.questions.is_empty() || bad {
                error!(target: "quiz", %id, topic = %entry.topic, "Skipping bank quiz: malformed questions.");
                continue;
            }
            bank.push(Quiz {
                id,
                topic: entry.topic,
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                wikipedia_enhanced: false,
                source: QuizSource::LocalBank,
                questions: entry.questions,
                generated_at: Utc::now(),
            });
        }
        if !bank.is_empty() {
            info!(target: "quiz", bank = bank.len(), "Startup quiz bank inventory");
        }

        // Open storage; a broken database degrades to memory-only operation.
        let db_path = std::env::var("QUIZ_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
        let storage = match Storage::open(&db_path).await {
            Ok(s) => {
                info!(target: "quizgen_backend", path = %db_path.display(), "Database ready");
                Some(Arc::new(s))
            }
            Err(e) => {
                warn!(target: "quizgen_backend", path = %db_path.display(), error = %e, "Database unavailable; running memory-only");
                None
            }
        };

        // Build optional Groq client (if API key present).
        let groq = Groq::from_env();
        if let Some(g) = &groq {
            info!(target: "quizgen_backend", base_url = %g.base_url, default_model = DEFAULT_MODEL, "Groq enabled.");
        } else {
            info!(target: "quizgen_backend", "Groq disabled (no GROQ_API_KEY). Using local fallback quizzes.");
        }

        let wikipedia = Wikipedia::new()?;

        Ok(Self {
            quizzes: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(Vec::new())),
            storage,
            groq,
            wikipedia,
            prompts,
            bank,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        })
    }

    /// Construct a state with explicit parts (tests).
    #[cfg(test)]
    pub fn for_tests(
        storage: Option<Arc<Storage>>,
        groq: Option<Groq>,
        wikipedia: Wikipedia,
        bank: Vec<Quiz>,
    ) -> Self {
        Self {
            quizzes: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(Vec::new())),
            storage,
            groq,
            wikipedia,
            prompts: Prompts::default(),
            bank,
            environment: "test".into(),
        }
    }

    /// Cache a quiz in memory and persist it best-effort.
    #[instrument(level = "debug", skip(self, quiz), fields(id = %quiz.id))]
    pub async fn insert_quiz(&self, quiz: Quiz) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.insert_quiz(&quiz).await {
                error!(target: "quiz", id = %quiz.id, error = %e, "Failed to persist quiz; kept in memory only.");
            }
        }
        self.quizzes.write().await.insert(quiz.id.clone(), quiz);
    }

    /// Look up a quiz: database first, then the in-memory cache and bank.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_quiz(&self, id: &str) -> Option<Quiz> {
        if let Some(storage) = &self.storage {
            match storage.get_quiz(id).await {
                Ok(Some(meta)) => match storage.get_questions(id).await {
                    Ok(questions) if !questions.is_empty() => {
                        return Some(Quiz {
                            id: meta.id,
                            topic: meta.topic,
                            model: meta.model,
                            temperature: meta.temperature,
                            wikipedia_enhanced: meta.wikipedia_enhanced,
                            source: meta.source,
                            questions,
                            generated_at: meta.created_at,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(target: "quiz", %id, error = %e, "Question lookup failed; trying memory.")
                    }
                },
                Ok(None) => {}
                Err(e) => error!(target: "quiz", %id, error = %e, "Quiz lookup failed; trying memory."),
            }
        }

        if let Some(q) = self.quizzes.read().await.get(id).cloned() {
            return Some(q);
        }
        self.bank.iter().find(|q| q.id == id).cloned()
    }

    /// Pick a bank quiz whose topic matches (case-insensitive). Multiple
    /// matches are sampled randomly so repeat requests vary.
    pub fn bank_quiz_for(&self, topic: &str) -> Option<Quiz> {
        let wanted = topic.trim().to_lowercase();
        let matches: Vec<&Quiz> = self
            .bank
            .iter()
            .filter(|q| q.topic.to_lowercase() == wanted)
            .collect();
        matches.choose(&mut rand::thread_rng()).map(|q| {
            let mut quiz = (*q).clone();
            // Fresh id per serving so each attempt grades against its own record.
            quiz.id = Uuid::new_v4().to_string();
            quiz.generated_at = Utc::now();
            quiz
        })
    }

    /// Append a graded attempt to the results log and persist it best-effort.
    #[instrument(level = "debug", skip(self, result), fields(quiz_id = %result.quiz_id))]
    pub async fn record_result(&self, result: QuizResult) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.insert_submission(&result, ANON_USER).await {
                error!(target: "quiz", quiz_id = %result.quiz_id, error = %e, "Failed to persist submission.");
            }
        }
        self.results.write().await.push(result);
    }
}
