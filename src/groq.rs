//! Minimal Groq client (OpenAI-compatible chat completions).
//!
//! We only call chat/completions and ask the model for strict JSON. Calls are
//! instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::QuizQuestion;
use crate::error::{QuizError, Result};
use crate::util::trunc_for_log;

/// Model served when the request names none (or an unknown one).
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Models we allow requests to pick from.
pub const AVAILABLE_MODELS: &[&str] = &[
  "llama-3.1-8b-instant",
  "llama-3.1-70b-versatile",
  "llama3-70b-8192",
  "mixtral-8x7b-32768",
  "gemma-7b-it",
  "gemma2-9b-it",
];

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const TIMEOUT_SECS: u64 = 20;
const QUIZ_MAX_TOKENS: u32 = 1500;

#[derive(Clone)]
pub struct Groq {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
}

impl Groq {
  /// Construct the client if we find GROQ_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GROQ_API_KEY").ok()?;
    let base_url =
      std::env::var("GROQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(TIMEOUT_SECS))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url })
  }

  /// Map a requested model onto the allowlist, falling back to the default.
  pub fn resolve_model(requested: Option<&str>) -> &'static str {
    match requested {
      Some(m) => AVAILABLE_MODELS
        .iter()
        .copied()
        .find(|known| *known == m)
        .unwrap_or(DEFAULT_MODEL),
      None => DEFAULT_MODEL,
    }
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: Option<u32>,
  ) -> Result<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      max_tokens,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("quizgen-backend/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| QuizError::Model(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_groq_error(&body).unwrap_or(body);
      return Err(QuizError::Model(format!("Groq HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| QuizError::Model(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Groq usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(QuizError::Model("no response generated".into()));
    }
    Ok(text)
  }

  /// Generate quiz questions for an already-assembled prompt. The completion
  /// text is mined for its JSON object, parsed, and validated.
  #[instrument(
    level = "info",
    skip(self, prompts, prompt),
    fields(model = %model, prompt_len = prompt.len())
  )]
  pub async fn generate_quiz_questions(
    &self,
    prompts: &Prompts,
    prompt: &str,
    model: &str,
    temperature: f32,
  ) -> Result<Vec<QuizQuestion>> {
    let start = std::time::Instant::now();
    let result = self
      .chat_plain(model, &prompts.quiz_system, prompt, temperature, Some(QUIZ_MAX_TOKENS))
      .await;
    let elapsed = start.elapsed();

    let text = match result {
      Ok(t) => {
        info!(?elapsed, response_len = t.len(), "Model response received");
        t
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during quiz generation");
        return Err(e);
      }
    };

    let value = extract_json_object(&text).map_err(|e| {
      error!(target: "quiz", raw = %trunc_for_log(&text, 200), "Model response was not parseable JSON");
      e
    })?;
    questions_from_value(value)
  }
}

/// Find the JSON object inside a completion (first `{` to last `}`). Models
/// occasionally wrap their JSON in prose or markdown fences.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
  let start = text.find('{');
  let end = text.rfind('}');
  match (start, end) {
    (Some(s), Some(e)) if e > s => serde_json::from_str(&text[s..=e])
      .map_err(|err| QuizError::Model(format!("JSON parse error: {err}"))),
    _ => Err(QuizError::Model("no JSON object found in model response".into())),
  }
}

/// Deserialize and validate the `{"questions": [...]}` payload.
fn questions_from_value(value: serde_json::Value) -> Result<Vec<QuizQuestion>> {
  #[derive(Deserialize)]
  struct Generated {
    questions: Vec<QuizQuestion>,
  }

  let generated: Generated = serde_json::from_value(value)
    .map_err(|e| QuizError::Model(format!("invalid quiz structure: {e}")))?;

  if generated.questions.is_empty() {
    return Err(QuizError::Model("quiz has no questions".into()));
  }
  for (i, q) in generated.questions.iter().enumerate() {
    if q.options.len() != 4 {
      return Err(QuizError::Model(format!(
        "question {i}: expected 4 options, got {}",
        q.options.len()
      )));
    }
    if q.correct_answer >= q.options.len() {
      return Err(QuizError::Model(format!(
        "question {i}: correct_answer {} out of range",
        q.correct_answer
      )));
    }
  }
  Ok(generated.questions)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from a Groq error body.
fn extract_groq_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn quiz_json() -> serde_json::Value {
    serde_json::json!({
      "questions": [
        {
          "question": "What is 2+2?",
          "options": ["3", "4", "5", "6"],
          "correct_answer": 1,
          "explanation": "2+2 equals 4"
        }
      ]
    })
  }

  #[test]
  fn resolve_model_allowlist() {
    assert_eq!(Groq::resolve_model(None), DEFAULT_MODEL);
    assert_eq!(Groq::resolve_model(Some("gemma2-9b-it")), "gemma2-9b-it");
    assert_eq!(Groq::resolve_model(Some("gpt-4o")), DEFAULT_MODEL);
  }

  #[test]
  fn json_extraction_from_plain_and_wrapped_text() {
    let v = extract_json_object(r#"{"questions": []}"#).unwrap();
    assert!(v.get("questions").is_some());

    let fenced = "Here is your quiz:\n```json\n{\"questions\": [{\"a\": 1}]}\n```\nEnjoy!";
    let v = extract_json_object(fenced).unwrap();
    assert_eq!(v["questions"][0]["a"], 1);

    assert!(extract_json_object("no json here").is_err());
    assert!(extract_json_object("} backwards {").is_err());
  }

  #[test]
  fn question_validation() {
    let ok = questions_from_value(quiz_json()).unwrap();
    assert_eq!(ok.len(), 1);
    assert_eq!(ok[0].correct_answer, 1);

    let empty = serde_json::json!({ "questions": [] });
    assert!(questions_from_value(empty).is_err());

    let three_options = serde_json::json!({
      "questions": [{ "question": "q", "options": ["a", "b", "c"], "correct_answer": 0, "explanation": "" }]
    });
    assert!(questions_from_value(three_options).is_err());

    let out_of_range = serde_json::json!({
      "questions": [{ "question": "q", "options": ["a", "b", "c", "d"], "correct_answer": 4, "explanation": "" }]
    });
    assert!(questions_from_value(out_of_range).is_err());

    let missing_field = serde_json::json!({ "nope": true });
    assert!(questions_from_value(missing_field).is_err());
  }

  #[tokio::test]
  async fn generate_quiz_questions_round_trip() {
    let server = MockServer::start().await;
    let completion = serde_json::json!({
      "choices": [{
        "message": { "role": "assistant", "content": quiz_json().to_string() },
        "finish_reason": "stop"
      }],
      "usage": { "prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200 }
    });
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer test-key"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion))
      .mount(&server)
      .await;

    let groq = Groq {
      client: reqwest::Client::new(),
      api_key: "test-key".into(),
      base_url: server.uri(),
    };
    let prompts = Prompts::default();
    let questions = groq
      .generate_quiz_questions(&prompts, "Create a quiz about math", DEFAULT_MODEL, 0.2)
      .await
      .expect("generate");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].options.len(), 4);
  }

  #[tokio::test]
  async fn generate_surfaces_upstream_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
        "error": { "message": "Rate limit reached", "type": "tokens" }
      })))
      .mount(&server)
      .await;

    let groq = Groq {
      client: reqwest::Client::new(),
      api_key: "test-key".into(),
      base_url: server.uri(),
    };
    let err = groq
      .generate_quiz_questions(&Prompts::default(), "prompt", DEFAULT_MODEL, 0.2)
      .await
      .unwrap_err();
    assert!(err.to_string().contains("Rate limit reached"));
    assert!(err.to_string().contains("429"));
  }
}
