//! Error type for the backend.
//!
//! Handlers return `Result<Json<T>, QuizError>`; the `IntoResponse` impl maps
//! each variant to a status code and a JSON body of the shape
//! `{ "error": ..., "details": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// Bad client input (missing topic, wrong answer count, ...).
    #[error("{message}")]
    InvalidRequest { message: String },

    /// Referenced quiz or article does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Chat-completion call or response parsing failed.
    #[error("model error: {0}")]
    Model(String),

    /// Wikipedia API call failed or returned an unusable payload.
    #[error("wikipedia error: {0}")]
    Wikipedia(String),

    /// Database or persistence layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            QuizError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "Invalid request"),
            QuizError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            QuizError::Model(_) => (StatusCode::BAD_GATEWAY, "Quiz generation failed"),
            QuizError::Wikipedia(_) => (StatusCode::BAD_GATEWAY, "Wikipedia request failed"),
            QuizError::Storage(_) | QuizError::Config { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };
        let body = Json(serde_json::json!({
            "error": label,
            "details": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = QuizError::invalid("Topic is required");
        assert_eq!(err.to_string(), "Topic is required");

        let err = QuizError::NotFound("quiz abc".into());
        assert_eq!(err.to_string(), "quiz abc not found");

        let err = QuizError::Model("HTTP 429".into());
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn status_mapping() {
        let resp = QuizError::invalid("nope").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = QuizError::NotFound("quiz x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = QuizError::Model("boom".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
