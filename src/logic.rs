//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Quiz generation (prompt assembly, optional Wikipedia enhancement,
//!     model call, fallback ladder: model -> TOML bank -> built-in seeds)
//!   - Grading submissions and producing per-question feedback
//!   - History, detail, and score statistics (database first, memory-only
//!     fallback when the database is unavailable)

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
  Quiz, QuizQuestion, QuizResult, QuizSource, ScoreStats, SubmissionRow, WikipediaContext,
};
use crate::enrich;
use crate::error::{QuizError, Result};
use crate::groq::Groq;
use crate::protocol::{QuizDetailOut, QuizHistoryItem};
use crate::seeds;
use crate::state::{AppState, ANON_USER};
use crate::util::fill_template;

/// How many recent attempts the stats endpoint reports.
const RECENT_LIMIT: u32 = 20;

/// Topic substrings we refuse to build quizzes for.
const INAPPROPRIATE_TOPICS: &[&str] = &[
  "vagina", "nipple", "sphincter", "feces", "penis", "breast", "sexual", "porn", "nude",
  "explicit", "nsfw", "adult",
];

pub fn is_topic_appropriate(topic: &str) -> bool {
  let lower = topic.to_lowercase();
  !INAPPROPRIATE_TOPICS.iter().any(|t| lower.contains(t))
}

/// Generate a quiz for a request. Never fails once the topic validates: the
/// model path degrades to the local bank, then to the built-in seed quiz.
#[instrument(level = "info", skip(state, req), fields(topic = %req.topic, enhanced = req.wikipedia_enhanced))]
pub async fn generate_quiz(
  state: &AppState,
  req: crate::protocol::GenerateQuizIn,
) -> Result<(Quiz, Option<WikipediaContext>)> {
  let topic = req.topic.trim().to_string();
  if topic.is_empty() {
    return Err(QuizError::invalid("Topic is required"));
  }
  if !is_topic_appropriate(&topic) {
    return Err(QuizError::invalid(
      "This topic is not appropriate for quiz generation. Please choose a different topic.",
    ));
  }

  let model = Groq::resolve_model(req.model.as_deref());
  let temperature = req.temperature.unwrap_or(0.2);

  // Assemble the prompt. Enhancement downgrades to the plain prompt when no
  // article clears the relevance bar.
  let mut context: Option<WikipediaContext> = None;
  let mut enhanced = false;
  let prompt = if req.wikipedia_enhanced {
    let supplied = req
      .enhanced_prompt
      .as_deref()
      .map(str::trim)
      .filter(|p| !p.is_empty());
    match supplied {
      Some(p) => {
        enhanced = true;
        p.to_string()
      }
      None => {
        let ctx = enrich::build_context(&state.wikipedia, &topic).await;
        if ctx.is_empty() {
          warn!(target: "quiz", %topic, "No trusted Wikipedia context; generating without enhancement");
          fill_template(&state.prompts.quiz_user_template, &[("topic", &topic)])
        } else {
          enhanced = true;
          let p = enrich::enhanced_prompt(&state.prompts, &topic, &ctx);
          context = Some(ctx);
          p
        }
      }
    }
  } else {
    fill_template(&state.prompts.quiz_user_template, &[("topic", &topic)])
  };

  let quiz = if let Some(groq) = &state.groq {
    match groq
      .generate_quiz_questions(&state.prompts, &prompt, model, temperature)
      .await
    {
      Ok(questions) => Quiz {
        id: Uuid::new_v4().to_string(),
        topic: topic.clone(),
        model: model.to_string(),
        temperature,
        wikipedia_enhanced: enhanced,
        source: QuizSource::Generated,
        questions,
        generated_at: Utc::now(),
      },
      Err(e) => {
        error!(target: "quiz", %topic, error = %e, "Model generation failed; using local fallback");
        local_fallback(state, &topic)
      }
    }
  } else {
    warn!(target: "quiz", %topic, "GROQ_API_KEY not set; using local fallback");
    local_fallback(state, &topic)
  };

  // Fallback quizzes were not built from the assembled context.
  if !quiz.wikipedia_enhanced {
    context = None;
  }

  info!(
    target: "quiz",
    id = %quiz.id,
    %topic,
    source = quiz.source.as_str(),
    questions = quiz.questions.len(),
    "Quiz ready"
  );
  state.insert_quiz(quiz.clone()).await;
  Ok((quiz, context))
}

fn local_fallback(state: &AppState, topic: &str) -> Quiz {
  state
    .bank_quiz_for(topic)
    .unwrap_or_else(|| seeds::fallback_quiz(topic))
}

/// Grade an attempt against its quiz and record the result.
#[instrument(level = "info", skip(state, answers), fields(%quiz_id, answer_count = answers.len()))]
pub async fn grade_submission(
  state: &AppState,
  quiz_id: &str,
  answers: &[usize],
) -> Result<QuizResult> {
  let Some(quiz) = state.get_quiz(quiz_id).await else {
    return Err(QuizError::invalid(
      "Quiz not found. Please generate a quiz first.",
    ));
  };

  if answers.len() != quiz.questions.len() {
    return Err(QuizError::invalid(format!(
      "Must submit exactly {} answers",
      quiz.questions.len()
    )));
  }

  let correct_answers: Vec<usize> = quiz.questions.iter().map(|q| q.correct_answer).collect();
  let score = answers
    .iter()
    .zip(correct_answers.iter())
    .filter(|(user, correct)| user == correct)
    .count();
  let total = quiz.questions.len();
  let feedback = generate_feedback(&quiz.questions, answers, &correct_answers);

  let result = QuizResult {
    quiz_id: quiz.id.clone(),
    topic: quiz.topic.clone(),
    user_answers: answers.to_vec(),
    correct_answers,
    score,
    total_questions: total,
    percentage: score as f32 / total as f32 * 100.0,
    submitted_at: Utc::now(),
    feedback,
  };

  info!(target: "quiz", id = %quiz.id, score, total, "Submission graded");
  state.record_result(result.clone()).await;
  Ok(result)
}

/// Per-question feedback lines, options lettered A-D.
pub fn generate_feedback(
  questions: &[QuizQuestion],
  user_answers: &[usize],
  correct_answers: &[usize],
) -> Vec<String> {
  let mut feedback = Vec::with_capacity(questions.len());
  for (i, (user, correct)) in user_answers.iter().zip(correct_answers.iter()).enumerate() {
    let explanation = match questions[i].explanation.as_str() {
      "" => "No explanation available.",
      e => e,
    };
    if user == correct {
      feedback.push(format!("Question {}: Correct! {}", i + 1, explanation));
    } else {
      let letter = char::from(b'A' + *correct as u8);
      feedback.push(format!(
        "Question {}: Incorrect. The correct answer was option {}. {}",
        i + 1,
        letter,
        explanation
      ));
    }
  }
  feedback
}

/// Stored quizzes, newest first, each with attempt statistics.
#[instrument(level = "info", skip(state), fields(skip, limit))]
pub async fn quiz_history(state: &AppState, skip: u32, limit: u32) -> Result<Vec<QuizHistoryItem>> {
  if let Some(storage) = &state.storage {
    let metas = storage.list_quizzes(skip, limit).await?;
    let mut items = Vec::with_capacity(metas.len());
    for meta in metas {
      let question_count = storage.question_count(&meta.id).await?;
      let (submission_count, average_score) = storage.submission_stats(&meta.id).await?;
      items.push(QuizHistoryItem {
        id: meta.id,
        topic: meta.topic,
        model: meta.model,
        temperature: meta.temperature,
        created_at: meta.created_at,
        question_count,
        submission_count,
        average_score,
        wikipedia_enhanced: meta.wikipedia_enhanced,
      });
    }
    return Ok(items);
  }

  // Memory-only rendition over the in-process stores.
  let quizzes = state.quizzes.read().await;
  let results = state.results.read().await;
  let mut items: Vec<QuizHistoryItem> = quizzes
    .values()
    .map(|q| {
      let attempts: Vec<&QuizResult> = results.iter().filter(|r| r.quiz_id == q.id).collect();
      let average_score = if attempts.is_empty() {
        None
      } else {
        Some(attempts.iter().map(|r| r.percentage as f64).sum::<f64>() / attempts.len() as f64)
      };
      QuizHistoryItem {
        id: q.id.clone(),
        topic: q.topic.clone(),
        model: q.model.clone(),
        temperature: q.temperature,
        created_at: q.generated_at,
        question_count: q.questions.len() as u32,
        submission_count: attempts.len() as u32,
        average_score,
        wikipedia_enhanced: q.wikipedia_enhanced,
      }
    })
    .collect();
  items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  Ok(items
    .into_iter()
    .skip(skip as usize)
    .take(limit as usize)
    .collect())
}

/// Full detail for one quiz: questions plus every recorded attempt.
#[instrument(level = "info", skip(state), fields(%quiz_id))]
pub async fn quiz_detail(state: &AppState, quiz_id: &str) -> Result<QuizDetailOut> {
  if let Some(storage) = &state.storage {
    if let Some(meta) = storage.get_quiz(quiz_id).await? {
      let questions = storage.get_questions(quiz_id).await?;
      let submissions = storage.submissions_for_quiz(quiz_id).await?;
      return Ok(QuizDetailOut {
        id: meta.id,
        topic: meta.topic,
        model: meta.model,
        temperature: meta.temperature,
        created_at: meta.created_at,
        questions,
        total_submissions: submissions.len(),
        submissions,
      });
    }
    // Not in the database; the quiz may predate a storage failure, so the
    // memory path below still gets a chance.
  }

  let Some(quiz) = state.quizzes.read().await.get(quiz_id).cloned() else {
    return Err(QuizError::NotFound(format!("quiz {quiz_id}")));
  };
  let results = state.results.read().await;
  let submissions: Vec<SubmissionRow> = results
    .iter()
    .filter(|r| r.quiz_id == quiz.id)
    .map(|r| SubmissionRow {
      id: Uuid::new_v4().to_string(),
      quiz_id: r.quiz_id.clone(),
      user_id: ANON_USER.into(),
      score: r.score,
      total_questions: r.total_questions,
      percentage: r.percentage,
      submitted_at: r.submitted_at,
    })
    .collect();
  Ok(QuizDetailOut {
    id: quiz.id.clone(),
    topic: quiz.topic,
    model: quiz.model,
    temperature: quiz.temperature,
    created_at: quiz.generated_at,
    questions: quiz.questions,
    total_submissions: submissions.len(),
    submissions,
  })
}

/// Rolling average / best / worst over recorded attempts.
#[instrument(level = "info", skip(state))]
pub async fn score_stats(state: &AppState) -> Result<ScoreStats> {
  if let Some(storage) = &state.storage {
    return storage.score_stats(RECENT_LIMIT).await;
  }

  let results = state.results.read().await;
  let mut stats = ScoreStats {
    total_attempts: results.len(),
    ..ScoreStats::default()
  };
  if !results.is_empty() {
    let sum: f32 = results.iter().map(|r| r.percentage).sum();
    stats.average_percentage = sum / results.len() as f32;
    stats.best_percentage = results.iter().map(|r| r.percentage).fold(f32::MIN, f32::max);
    stats.worst_percentage = results.iter().map(|r| r.percentage).fold(f32::MAX, f32::min);
    stats.recent = results
      .iter()
      .rev()
      .take(RECENT_LIMIT as usize)
      .map(|r| r.percentage)
      .collect();
  }
  Ok(stats)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::protocol::GenerateQuizIn;
  use crate::wikipedia::Wikipedia;

  fn test_state() -> AppState {
    let wikipedia = Wikipedia::with_endpoints("http://127.0.0.1:9/w/api.php", "http://127.0.0.1:9")
      .expect("client");
    AppState::for_tests(None, None, wikipedia, Vec::new())
  }

  fn bank_state() -> AppState {
    let wikipedia = Wikipedia::with_endpoints("http://127.0.0.1:9/w/api.php", "http://127.0.0.1:9")
      .expect("client");
    let bank = vec![Quiz {
      id: "bank-1".into(),
      topic: "Solar System".into(),
      model: "llama-3.1-8b-instant".into(),
      temperature: 0.0,
      wikipedia_enhanced: false,
      source: QuizSource::LocalBank,
      questions: vec![QuizQuestion {
        question: "Largest planet?".into(),
        options: vec!["Earth".into(), "Jupiter".into(), "Mars".into(), "Venus".into()],
        correct_answer: 1,
        explanation: "Jupiter is the largest.".into(),
      }],
      generated_at: Utc::now(),
    }];
    AppState::for_tests(None, None, wikipedia, bank)
  }

  fn plain_request(topic: &str) -> GenerateQuizIn {
    GenerateQuizIn {
      topic: topic.into(),
      model: None,
      temperature: None,
      wikipedia_enhanced: false,
      enhanced_prompt: None,
    }
  }

  #[test]
  fn topic_filtering() {
    assert!(is_topic_appropriate("Roman Empire"));
    assert!(is_topic_appropriate("Breakfast foods"));
    assert!(!is_topic_appropriate("explicit content"));
    assert!(!is_topic_appropriate("ADULT themes"));
  }

  #[test]
  fn feedback_lines() {
    let questions = vec![
      QuizQuestion {
        question: "Q1".into(),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_answer: 2,
        explanation: "It is c.".into(),
      },
      QuizQuestion {
        question: "Q2".into(),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_answer: 0,
        explanation: String::new(),
      },
    ];
    let feedback = generate_feedback(&questions, &[2, 1], &[2, 0]);
    assert_eq!(feedback[0], "Question 1: Correct! It is c.");
    assert_eq!(
      feedback[1],
      "Question 2: Incorrect. The correct answer was option A. No explanation available."
    );
  }

  #[tokio::test]
  async fn generate_rejects_bad_topics() {
    let state = test_state();
    let err = generate_quiz(&state, plain_request("   ")).await.unwrap_err();
    assert!(err.to_string().contains("Topic is required"));

    let err = generate_quiz(&state, plain_request("porn history"))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("not appropriate"));
  }

  #[tokio::test]
  async fn generate_without_model_serves_seed_fallback() {
    let state = test_state();
    let (quiz, context) = generate_quiz(&state, plain_request("Ottoman Empire"))
      .await
      .expect("fallback quiz");
    assert_eq!(quiz.source, QuizSource::Seed);
    assert_eq!(quiz.topic, "Ottoman Empire");
    assert!(context.is_none());
    // The quiz is cached so submissions can find it.
    assert!(state.get_quiz(&quiz.id).await.is_some());
  }

  #[tokio::test]
  async fn generate_prefers_bank_over_seeds() {
    let state = bank_state();
    let (quiz, _) = generate_quiz(&state, plain_request("solar system"))
      .await
      .expect("bank quiz");
    assert_eq!(quiz.source, QuizSource::LocalBank);
    assert_eq!(quiz.questions.len(), 1);
  }

  #[tokio::test]
  async fn grading_round_trip() {
    let state = bank_state();
    let (quiz, _) = generate_quiz(&state, plain_request("Solar System"))
      .await
      .unwrap();

    let result = grade_submission(&state, &quiz.id, &[1]).await.expect("graded");
    assert_eq!(result.score, 1);
    assert_eq!(result.total_questions, 1);
    assert!((result.percentage - 100.0).abs() < 1e-6);
    assert!(result.feedback[0].starts_with("Question 1: Correct!"));

    let result = grade_submission(&state, &quiz.id, &[0]).await.expect("graded");
    assert_eq!(result.score, 0);
    assert!((result.percentage - 0.0).abs() < 1e-6);
    assert!(result.feedback[0].contains("option B"));
  }

  #[tokio::test]
  async fn grading_validates_input() {
    let state = bank_state();
    let (quiz, _) = generate_quiz(&state, plain_request("Solar System"))
      .await
      .unwrap();

    let err = grade_submission(&state, &quiz.id, &[0, 1]).await.unwrap_err();
    assert!(err.to_string().contains("exactly 1 answers"));

    let err = grade_submission(&state, "no-such-quiz", &[0]).await.unwrap_err();
    assert!(err.to_string().contains("Quiz not found"));
  }

  #[tokio::test]
  async fn memory_only_history_and_stats() {
    let state = bank_state();
    let (quiz, _) = generate_quiz(&state, plain_request("Solar System"))
      .await
      .unwrap();
    grade_submission(&state, &quiz.id, &[1]).await.unwrap();
    grade_submission(&state, &quiz.id, &[0]).await.unwrap();

    let history = quiz_history(&state, 0, 100).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].submission_count, 2);
    assert_eq!(history[0].question_count, 1);
    let avg = history[0].average_score.expect("average");
    assert!((avg - 50.0).abs() < 1e-6);

    let detail = quiz_detail(&state, &quiz.id).await.unwrap();
    assert_eq!(detail.total_submissions, 2);
    assert_eq!(detail.questions.len(), 1);

    assert!(quiz_detail(&state, "missing").await.is_err());

    let stats = score_stats(&state).await.unwrap();
    assert_eq!(stats.total_attempts, 2);
    assert!((stats.average_percentage - 50.0).abs() < 1e-3);
    assert!((stats.best_percentage - 100.0).abs() < 1e-3);
    assert!(stats.worst_percentage.abs() < 1e-3);
    assert_eq!(stats.recent.len(), 2);
    // Newest first.
    assert!((stats.recent[0] - 0.0).abs() < 1e-6);
  }
}
