//! Loading backend configuration (prompts + optional local quiz bank) from TOML.
//!
//! See `QuizConfig` and `Prompts` for the expected schema. The file path comes
//! from the QUIZ_CONFIG_PATH environment variable; everything has defaults so
//! the server runs with no config at all.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::QuizQuestion;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub quizzes: Vec<QuizBankEntry>,
}

/// Pre-authored quiz accepted in TOML configuration. Served when the model is
/// unavailable and the topic matches.
#[derive(Clone, Debug, Deserialize)]
pub struct QuizBankEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
}

/// Prompts used by the Groq client. Defaults produce a five-question
/// multiple-choice quiz as strict JSON. Override them in TOML to tune
/// tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub quiz_system: String,
    pub quiz_user_template: String,
    pub enhanced_user_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            quiz_system: "You are a JSON generator. You must respond with ONLY valid, complete JSON. \
                Never include explanatory text, markdown formatting, or any content outside the JSON \
                object. Ensure all JSON syntax is correct with proper quotes, commas, and brackets."
                .into(),
            quiz_user_template: r#"Create a multiple-choice quiz about "{topic}" with exactly 5 questions.

Each question should have 4 options (A, B, C, D) with only one correct answer.
Include an explanation for the correct answer.

Respond with ONLY this JSON format:
{
    "questions": [
        {
            "question": "Question text?",
            "options": ["Option A", "Option B", "Option C", "Option D"],
            "correct_answer": 0,
            "explanation": "Why this answer is correct"
        }
    ]
}

The correct_answer should be the index (0-3) of the correct option."#
                .into(),
            enhanced_user_template: r#"Create a multiple-choice quiz about "{topic}" with exactly 5 questions.

Base the questions on the reference material below. Prefer facts stated in it
and do not invent details that contradict it.

Reference material:
{context}

Each question should have 4 options (A, B, C, D) with only one correct answer.
Include an explanation for the correct answer.

Respond with ONLY this JSON format:
{
    "questions": [
        {
            "question": "Question text?",
            "options": ["Option A", "Option B", "Option C", "Option D"],
            "correct_answer": 0,
            "explanation": "Why this answer is correct"
        }
    ]
}

The correct_answer should be the index (0-3) of the correct option."#
                .into(),
        }
    }
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO
/// error, returns None and the server falls back to defaults.
pub fn load_quiz_config_from_env() -> Option<QuizConfig> {
    let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(s) => match toml::from_str::<QuizConfig>(&s) {
            Ok(cfg) => {
                info!(target: "quizgen_backend", %path, bank = cfg.quizzes.len(), "Loaded quiz config (TOML)");
                Some(cfg)
            }
            Err(e) => {
                error!(target: "quizgen_backend", %path, error = %e, "Failed to parse TOML config");
                None
            }
        },
        Err(e) => {
            error!(target: "quizgen_backend", %path, error = %e, "Failed to read TOML config file");
            None
        }
    }
}
