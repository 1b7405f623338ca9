//! HTTP endpoint handlers. These are thin wrappers that forward to the quiz service.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::Difficulty;
use crate::error::{GenerationError, RepositoryError, ServiceError};
use crate::generator::GenerateOptions;
use crate::logic::{quiz_bonus, QuestionQuality, QuizRequest};
use crate::protocol::*;
use crate::scorer::quality_report;
use crate::state::AppState;

/// Handler failure rendered as `{ "error": code, "message": ... }`.
#[derive(Debug)]
pub enum ApiError {
  BadRequest(String),
  Service(ServiceError),
}

impl From<ServiceError> for ApiError {
  fn from(e: ServiceError) -> Self {
    ApiError::Service(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, error, message) = match self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
      ApiError::Service(e) => {
        let (status, code) = match &e {
          ServiceError::Generation(GenerationError::FallbackExhausted { .. })
          | ServiceError::Generation(_)
          | ServiceError::Aborted => (StatusCode::SERVICE_UNAVAILABLE, "quiz_unavailable"),
          ServiceError::Repository(RepositoryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
          ServiceError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
          ServiceError::BonusOutOfRange(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        (status, code, e.to_string())
      }
    };
    if status.is_server_error() {
      warn!(target: "infraquiz", %status, error, %message, "Request failed");
    }
    (status, Json(ErrorOut { error, message })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let generation_enabled = state.generator.settings().enabled;
  let llm_reachable = if generation_enabled {
    Some(state.completion.health_check().await)
  } else {
    None
  };
  Json(HealthOut {
    ok: true,
    generation_enabled,
    model: state.model.clone(),
    llm_reachable,
  })
}

#[instrument(level = "info", skip(state), fields(difficulty = ?q.difficulty, infra = ?q.infra, turn = ?q.turn))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Query(q): Query<QuizQuery>,
) -> Result<Json<QuizOut>, ApiError> {
  let difficulty = q
    .difficulty
    .as_deref()
    .map(str::parse::<Difficulty>)
    .transpose()
    .map_err(ApiError::BadRequest)?;
  let exclude_ids = split_list(q.exclude.as_deref())
    .iter()
    .map(|s| Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("exclude: {e}"))))
    .collect::<Result<Vec<_>, _>>()?;

  let req = QuizRequest {
    difficulty,
    turn: q.turn,
    infra: split_list(q.infra.as_deref()),
    options: GenerateOptions { exclude_ids, ..GenerateOptions::default() },
  };
  let quiz = state.service.next_quiz(req).await?;
  info!(target: "quiz", id = %quiz.id, difficulty = %quiz.difficulty, source = ?quiz.source, "HTTP quiz served");
  Ok(Json(to_out(&quiz)))
}

#[instrument(level = "info", skip(state, body), fields(quiz_id = %body.quiz_id, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let outcome = state.service.submit_answer(body.quiz_id, &body.answer).await?;
  info!(target: "quiz", id = %body.quiz_id, correct = outcome.correct, "HTTP answer evaluated");
  Ok(Json(AnswerOut {
    correct: outcome.correct,
    correct_answer: outcome.correct_answer,
    explanation: outcome.explanation,
    accuracy_rate: outcome.accuracy_rate,
  }))
}

#[derive(Debug, Deserialize)]
pub struct BonusQuery {
  pub correct: u32,
}

#[instrument(level = "info")]
pub async fn http_get_bonus(Query(q): Query<BonusQuery>) -> Result<Json<serde_json::Value>, ApiError> {
  let bonus = quiz_bonus(q.correct)?;
  Ok(Json(serde_json::json!({ "correct": q.correct, "bonus": bonus })))
}

fn metrics_out(state: &AppState) -> MetricsOut {
  MetricsOut {
    generation: state.generator.metrics().snapshot(),
    reference: state.reference.metrics(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(metrics_out(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  state.generator.metrics().reset();
  info!(target: "quiz", "Generation metrics reset");
  Json(metrics_out(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.cache.stats().await)
}

/// Accuracy flags per active quiz (TOO_EASY, TOO_HARD, BALANCED, INSUFFICIENT_DATA).
#[instrument(level = "info", skip(state))]
pub async fn http_question_quality(State(state): State<Arc<AppState>>) -> Result<Json<Vec<QuestionQuality>>, ApiError> {
  Ok(Json(state.service.question_quality().await?))
}

/// Drop pooled quizzes, cache counters and cached reference text.
#[instrument(level = "info", skip(state))]
pub async fn http_cache_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  state.cache.clear().await;
  state.reference.clear_cache().await;
  Json(state.cache.stats().await)
}

#[instrument(level = "info", skip(state, body), fields(question_len = body.question.len()))]
pub async fn http_post_quality(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QualityIn>,
) -> impl IntoResponse {
  let quiz = body.into_quiz();
  let (validation, quality) = state.service.assess(&quiz, &quiz.infra_context);
  let report = quality_report(&quiz, &quality);
  info!(target: "quiz", valid = validation.is_valid, total = quality.total, "HTTP quality assessed");
  Json(QualityOut { grade: quality.grade(), validation, quality, report })
}
