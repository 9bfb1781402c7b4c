//! SQL migration definitions for the quiz database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: quizzes, quiz_questions, quiz_submissions",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Generated quizzes
CREATE TABLE IF NOT EXISTS quizzes (
    id                 TEXT PRIMARY KEY,
    topic              TEXT NOT NULL,
    model              TEXT,
    temperature        REAL NOT NULL DEFAULT 0.2,
    wikipedia_enhanced INTEGER NOT NULL DEFAULT 0,
    source             TEXT NOT NULL DEFAULT 'generated',
    created_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quizzes_created ON quizzes(created_at);

-- Questions belonging to a quiz; options stored as a JSON array
CREATE TABLE IF NOT EXISTS quiz_questions (
    id             TEXT PRIMARY KEY,
    quiz_id        TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    question       TEXT NOT NULL,
    options_json   TEXT NOT NULL,
    correct_answer INTEGER NOT NULL,
    explanation    TEXT,
    question_order INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_questions_quiz ON quiz_questions(quiz_id);

-- Graded attempts
CREATE TABLE IF NOT EXISTS quiz_submissions (
    id              TEXT PRIMARY KEY,
    quiz_id         TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    user_id         TEXT,
    score           INTEGER NOT NULL,
    total_questions INTEGER NOT NULL,
    percentage      REAL NOT NULL,
    submitted_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_quiz ON quiz_submissions(quiz_id);
CREATE INDEX IF NOT EXISTS idx_submissions_time ON quiz_submissions(submitted_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
