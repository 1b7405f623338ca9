//! Error types for the quiz pipeline.
//!
//! Only `GenerationError::FallbackExhausted` ever reaches a caller of
//! `QuizGenerator::generate`; every other variant is absorbed by the attempt
//! loop and shows up in metrics and logs instead.

use thiserror::Error;

/// Failure of a single text-completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
  #[error("completion endpoint returned HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("completion transport error: {0}")]
  Transport(String),
  #[error("completion timed out after {0} ms")]
  Timeout(u64),
  #[error("completion response contained no text")]
  Empty,
}

impl From<reqwest::Error> for CompletionError {
  fn from(e: reqwest::Error) -> Self {
    CompletionError::Transport(e.to_string())
  }
}

/// Outcome categories of one generation attempt, plus the terminal condition.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("completion failed: {0}")]
  CompletionFailure(#[from] CompletionError),
  #[error("could not parse model output: {0}")]
  ParseFailure(String),
  #[error("candidate rejected by validator: {}", .0.join("; "))]
  ValidationFailure(Vec<String>),
  #[error("candidate quality {score} below gate {min}")]
  QualityFailure { score: u32, min: u32 },
  #[error("no quiz available for {difficulty}: generation and fallback pool exhausted")]
  FallbackExhausted { difficulty: String },
}

impl GenerationError {
  /// True for per-attempt failures that the attempt loop may retry.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, GenerationError::FallbackExhausted { .. })
  }

  /// Short label used in logs.
  pub fn category(&self) -> &'static str {
    match self {
      GenerationError::CompletionFailure(_) => "completion",
      GenerationError::ParseFailure(_) => "parse",
      GenerationError::ValidationFailure(_) => "validation",
      GenerationError::QualityFailure { .. } => "quality",
      GenerationError::FallbackExhausted { .. } => "fallback_exhausted",
    }
  }
}

/// Shared cache store failure. Never escapes `CachePool`.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache store unavailable: {0}")]
  Store(String),
  #[error("corrupt cache entry: {0}")]
  Corrupt(#[from] serde_json::Error),
}

/// Reference-content lookup failure. Absorbed by `ReferenceContext`.
#[derive(Debug, Error)]
pub enum DocsError {
  #[error("docs service returned HTTP {0}")]
  Status(u16),
  #[error("docs transport error: {0}")]
  Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error("quiz {0} not found")]
  NotFound(uuid::Uuid),
  #[error("quiz storage failure: {0}")]
  Storage(String),
}

/// What the quiz service can report to its callers (HTTP handlers).
#[derive(Debug, Error)]
pub enum ServiceError {
  #[error(transparent)]
  Generation(#[from] GenerationError),
  #[error(transparent)]
  Repository(#[from] RepositoryError),
  #[error("correct count {0} is outside 0..=5")]
  BonusOutOfRange(u32),
  #[error("quiz request was dropped before completion")]
  Aborted,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_fallback_exhaustion_is_terminal() {
    assert!(GenerationError::ParseFailure("x".into()).is_retryable());
    assert!(GenerationError::QualityFailure { score: 40, min: 60 }.is_retryable());
    assert!(GenerationError::CompletionFailure(CompletionError::Empty).is_retryable());
    assert!(!GenerationError::FallbackExhausted { difficulty: "EASY".into() }.is_retryable());
  }

  #[test]
  fn validation_failure_lists_every_issue() {
    let e = GenerationError::ValidationFailure(vec!["a".into(), "b".into()]);
    assert_eq!(e.to_string(), "candidate rejected by validator: a; b");
  }
}
