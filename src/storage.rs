//! libSQL storage layer for quizzes, questions, and submissions.
//!
//! The [`Storage`] struct wraps a local libSQL database. Persistence is best
//! effort at the call sites: a missing or broken database never takes the
//! service down, it only loses history.

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database};

use crate::domain::{Quiz, QuizMeta, QuizQuestion, QuizResult, QuizSource, ScoreStats, SubmissionRow};
use crate::error::{QuizError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| QuizError::Storage(format!("create {parent:?}: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;
        let conn = db.connect().map_err(|e| QuizError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in crate::migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    QuizError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Quiz operations
    // -----------------------------------------------------------------------

    /// Insert a quiz and all of its questions.
    pub async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO quizzes (id, topic, model, temperature, wikipedia_enhanced, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    quiz.id.as_str(),
                    quiz.topic.as_str(),
                    quiz.model.as_str(),
                    quiz.temperature as f64,
                    quiz.wikipedia_enhanced as i64,
                    quiz.source.as_str(),
                    quiz.generated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        for (order, q) in quiz.questions.iter().enumerate() {
            let options_json = serde_json::to_string(&q.options)
                .map_err(|e| QuizError::Storage(format!("encode options: {e}")))?;
            self.conn
                .execute(
                    "INSERT INTO quiz_questions (id, quiz_id, question, options_json, correct_answer, explanation, question_order)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        quiz.id.as_str(),
                        q.question.as_str(),
                        options_json.as_str(),
                        q.correct_answer as i64,
                        q.explanation.as_str(),
                        order as i64,
                    ],
                )
                .await
                .map_err(|e| QuizError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Get a quiz row (without questions) by id.
    pub async fn get_quiz(&self, id: &str) -> Result<Option<QuizMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, topic, model, temperature, wikipedia_enhanced, source, created_at
                 FROM quizzes WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_quiz_meta(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(QuizError::Storage(e.to_string())),
        }
    }

    /// All questions for a quiz, in question order.
    pub async fn get_questions(&self, quiz_id: &str) -> Result<Vec<QuizQuestion>> {
        let mut rows = self
            .conn
            .query(
                "SELECT question, options_json, correct_answer, explanation
                 FROM quiz_questions WHERE quiz_id = ?1 ORDER BY question_order",
                params![quiz_id],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        let mut questions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let options_json: String =
                row.get(1).map_err(|e| QuizError::Storage(e.to_string()))?;
            let options: Vec<String> = serde_json::from_str(&options_json)
                .map_err(|e| QuizError::Storage(format!("decode options: {e}")))?;
            questions.push(QuizQuestion {
                question: row.get(0).map_err(|e| QuizError::Storage(e.to_string()))?,
                options,
                correct_answer: row
                    .get::<i64>(2)
                    .map_err(|e| QuizError::Storage(e.to_string()))? as usize,
                explanation: row.get::<String>(3).unwrap_or_default(),
            });
        }
        Ok(questions)
    }

    /// List quizzes, newest first, with pagination.
    pub async fn list_quizzes(&self, skip: u32, limit: u32) -> Result<Vec<QuizMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, topic, model, temperature, wikipedia_enhanced, source, created_at
                 FROM quizzes ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                params![limit, skip],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_quiz_meta(&row)?);
        }
        Ok(results)
    }

    /// Number of questions in a quiz.
    pub async fn question_count(&self, quiz_id: &str) -> Result<u32> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = ?1",
                params![quiz_id],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<u32>(0).unwrap_or(0)),
            _ => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Submission operations
    // -----------------------------------------------------------------------

    /// Record a graded attempt.
    pub async fn insert_submission(&self, result: &QuizResult, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO quiz_submissions (id, quiz_id, user_id, score, total_questions, percentage, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    result.quiz_id.as_str(),
                    user_id,
                    result.score as i64,
                    result.total_questions as i64,
                    result.percentage as f64,
                    result.submitted_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;
        Ok(())
    }

    /// All submissions for a quiz, newest first.
    pub async fn submissions_for_quiz(&self, quiz_id: &str) -> Result<Vec<SubmissionRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, quiz_id, user_id, score, total_questions, percentage, submitted_at
                 FROM quiz_submissions WHERE quiz_id = ?1 ORDER BY submitted_at DESC",
                params![quiz_id],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(SubmissionRow {
                id: row.get(0).map_err(|e| QuizError::Storage(e.to_string()))?,
                quiz_id: row.get(1).map_err(|e| QuizError::Storage(e.to_string()))?,
                user_id: row.get::<String>(2).unwrap_or_else(|_| "anonymous".into()),
                score: row
                    .get::<i64>(3)
                    .map_err(|e| QuizError::Storage(e.to_string()))? as usize,
                total_questions: row
                    .get::<i64>(4)
                    .map_err(|e| QuizError::Storage(e.to_string()))? as usize,
                percentage: row
                    .get::<f64>(5)
                    .map_err(|e| QuizError::Storage(e.to_string()))? as f32,
                submitted_at: parse_timestamp(
                    &row.get::<String>(6)
                        .map_err(|e| QuizError::Storage(e.to_string()))?,
                )?,
            });
        }
        Ok(results)
    }

    /// Submission count and average percentage for a quiz.
    pub async fn submission_stats(&self, quiz_id: &str) -> Result<(u32, Option<f64>)> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), AVG(percentage) FROM quiz_submissions WHERE quiz_id = ?1",
                params![quiz_id],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(Some(row)) => {
                let count = row.get::<u32>(0).unwrap_or(0);
                let avg = row.get::<f64>(1).ok();
                Ok((count, avg))
            }
            _ => Ok((0, None)),
        }
    }

    /// Rolling performance statistics over all stored attempts.
    pub async fn score_stats(&self, recent_limit: u32) -> Result<ScoreStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), AVG(percentage), MAX(percentage), MIN(percentage)
                 FROM quiz_submissions",
                params![],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;

        let mut stats = ScoreStats::default();
        if let Ok(Some(row)) = rows.next().await {
            stats.total_attempts = row.get::<u32>(0).unwrap_or(0) as usize;
            stats.average_percentage = row.get::<f64>(1).unwrap_or(0.0) as f32;
            stats.best_percentage = row.get::<f64>(2).unwrap_or(0.0) as f32;
            stats.worst_percentage = row.get::<f64>(3).unwrap_or(0.0) as f32;
        }

        let mut rows = self
            .conn
            .query(
                "SELECT percentage FROM quiz_submissions ORDER BY submitted_at DESC LIMIT ?1",
                params![recent_limit],
            )
            .await
            .map_err(|e| QuizError::Storage(e.to_string()))?;
        while let Ok(Some(row)) = rows.next().await {
            if let Ok(p) = row.get::<f64>(0) {
                stats.recent.push(p as f32);
            }
        }
        Ok(stats)
    }
}

/// Convert a database row to a [`QuizMeta`].
fn row_to_quiz_meta(row: &libsql::Row) -> Result<QuizMeta> {
    Ok(QuizMeta {
        id: row.get(0).map_err(|e| QuizError::Storage(e.to_string()))?,
        topic: row.get(1).map_err(|e| QuizError::Storage(e.to_string()))?,
        model: row.get::<String>(2).unwrap_or_default(),
        temperature: row.get::<f64>(3).unwrap_or(0.2) as f32,
        wikipedia_enhanced: row.get::<i64>(4).unwrap_or(0) != 0,
        source: QuizSource::parse(&row.get::<String>(5).unwrap_or_default()),
        created_at: parse_timestamp(
            &row.get::<String>(6)
                .map_err(|e| QuizError::Storage(e.to_string()))?,
        )?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QuizError::Storage(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("quizgen_test_{}.db", Uuid::new_v4()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_quiz(topic: &str) -> Quiz {
        Quiz {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.2,
            wikipedia_enhanced: false,
            source: QuizSource::Generated,
            questions: vec![
                QuizQuestion {
                    question: "Q1?".into(),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer: 0,
                    explanation: "because".into(),
                },
                QuizQuestion {
                    question: "Q2?".into(),
                    options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
                    correct_answer: 3,
                    explanation: String::new(),
                },
            ],
            generated_at: Utc::now(),
        }
    }

    fn sample_result(quiz: &Quiz, score: usize) -> QuizResult {
        let total = quiz.questions.len();
        QuizResult {
            quiz_id: quiz.id.clone(),
            topic: quiz.topic.clone(),
            user_answers: vec![0; total],
            correct_answers: quiz.questions.iter().map(|q| q.correct_answer).collect(),
            score,
            total_questions: total,
            percentage: score as f32 / total as f32 * 100.0,
            submitted_at: Utc::now(),
            feedback: Vec::new(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("quizgen_test_{}.db", Uuid::new_v4()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn quiz_round_trip() {
        let storage = test_storage().await;
        let quiz = sample_quiz("Rust");
        storage.insert_quiz(&quiz).await.expect("insert quiz");

        let meta = storage.get_quiz(&quiz.id).await.expect("get").unwrap();
        assert_eq!(meta.topic, "Rust");
        assert_eq!(meta.source, QuizSource::Generated);

        let questions = storage.get_questions(&quiz.id).await.expect("questions");
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "Q1?");
        assert_eq!(questions[1].correct_answer, 3);
        assert_eq!(questions[1].options, vec!["w", "x", "y", "z"]);

        assert_eq!(storage.question_count(&quiz.id).await.unwrap(), 2);
        assert!(storage.get_quiz("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paginated() {
        let storage = test_storage().await;
        for i in 0..3 {
            let mut quiz = sample_quiz(&format!("topic-{i}"));
            quiz.generated_at = Utc::now() + chrono::Duration::seconds(i);
            storage.insert_quiz(&quiz).await.unwrap();
        }

        let all = storage.list_quizzes(0, 100).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].topic, "topic-2");

        let page = storage.list_quizzes(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].topic, "topic-1");
    }

    #[tokio::test]
    async fn submissions_and_stats() {
        let storage = test_storage().await;
        let quiz = sample_quiz("History");
        storage.insert_quiz(&quiz).await.unwrap();

        storage
            .insert_submission(&sample_result(&quiz, 2), "anonymous")
            .await
            .unwrap();
        storage
            .insert_submission(&sample_result(&quiz, 1), "anonymous")
            .await
            .unwrap();

        let subs = storage.submissions_for_quiz(&quiz.id).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].total_questions, 2);

        let (count, avg) = storage.submission_stats(&quiz.id).await.unwrap();
        assert_eq!(count, 2);
        let avg = avg.expect("average present");
        assert!((avg - 75.0).abs() < 1e-6);

        let (count, avg) = storage.submission_stats("missing").await.unwrap();
        assert_eq!(count, 0);
        assert!(avg.is_none());
    }

    #[tokio::test]
    async fn score_stats_rollup() {
        let storage = test_storage().await;
        let quiz = sample_quiz("Math");
        storage.insert_quiz(&quiz).await.unwrap();

        for score in [0, 1, 2] {
            storage
                .insert_submission(&sample_result(&quiz, score), "anonymous")
                .await
                .unwrap();
        }

        let stats = storage.score_stats(2).await.unwrap();
        assert_eq!(stats.total_attempts, 3);
        assert!((stats.average_percentage - 50.0).abs() < 1e-3);
        assert!((stats.best_percentage - 100.0).abs() < 1e-3);
        assert!(stats.worst_percentage.abs() < 1e-3);
        assert_eq!(stats.recent.len(), 2);
    }

    #[tokio::test]
    async fn empty_stats_are_zeroed() {
        let storage = test_storage().await;
        let stats = storage.score_stats(10).await.unwrap();
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.average_percentage, 0.0);
        assert!(stats.recent.is_empty());
    }
}
