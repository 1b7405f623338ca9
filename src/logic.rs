//! Quiz service used by the HTTP handlers.
//!
//! This includes:
//!   - Serving the next quiz for a turn (pool, generation or fallback)
//!   - Checking and recording answers
//!   - Round bonus for a five-question quiz round
//!   - Scoring arbitrary candidates for operators
//!   - Per-question accuracy flags from recorded answers

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::CachePool;
use crate::domain::{Difficulty, QualityFlag, Quiz, QuizSource, QuizType};
use crate::error::ServiceError;
use crate::generator::{GenerateOptions, QuizGenerator};
use crate::prompt::infer_difficulty_from_turn;
use crate::repository::QuizRepository;
use crate::scorer::{QualityScore, QualityScorer};
use crate::validator::{QuizValidator, ValidationResult};

/// Questions in one quiz round.
pub const ROUND_SIZE: u32 = 5;

const PREVIEW_CHARS: usize = 100;

/// Case-insensitive, whitespace-trimmed comparison against the stored answer.
pub fn validate_answer(quiz: &Quiz, answer: &str) -> bool {
  answer.trim().to_lowercase() == quiz.correct_answer.trim().to_lowercase()
}

/// Bonus points for `correct` right answers out of a five-question round.
pub fn quiz_bonus(correct: u32) -> Result<u32, ServiceError> {
  match correct {
    5 => Ok(50),
    4 => Ok(30),
    3 => Ok(15),
    2 => Ok(5),
    0 | 1 => Ok(0),
    other => Err(ServiceError::BonusOutOfRange(other)),
  }
}

#[derive(Clone, Debug, Default)]
pub struct QuizRequest {
  /// Explicit difficulty; otherwise inferred from `turn`.
  pub difficulty: Option<Difficulty>,
  pub turn: Option<u32>,
  pub infra: Vec<String>,
  pub options: GenerateOptions,
}

impl QuizRequest {
  pub fn difficulty(&self) -> Difficulty {
    self.difficulty.unwrap_or_else(|| infer_difficulty_from_turn(self.turn))
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerOutcome {
  pub correct: bool,
  pub correct_answer: String,
  pub explanation: String,
  pub accuracy_rate: f64,
  pub total_answers: u32,
}

/// One row of the question quality report.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionQuality {
  pub quiz_id: Uuid,
  pub question: String,
  pub difficulty: Difficulty,
  #[serde(rename = "type")]
  pub quiz_type: QuizType,
  pub usage_count: u32,
  /// Two decimals; `None` until the first answer.
  pub accuracy_rate: Option<f64>,
  pub quality_flag: QualityFlag,
  pub infra_context: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl QuestionQuality {
  pub fn from_quiz(quiz: &Quiz) -> Self {
    let question = if quiz.question.chars().count() > PREVIEW_CHARS {
      format!("{}...", quiz.question.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
      quiz.question.clone()
    };
    let accuracy_rate = (quiz.total_answer_count > 0).then(|| (quiz.accuracy_rate() * 100.0).round() / 100.0);
    Self {
      quiz_id: quiz.id,
      question,
      difficulty: quiz.difficulty,
      quiz_type: quiz.quiz_type,
      usage_count: quiz.usage_count,
      accuracy_rate,
      quality_flag: QualityFlag::classify(quiz.correct_answer_count, quiz.total_answer_count),
      infra_context: quiz.infra_context.clone(),
      created_at: quiz.created_at,
    }
  }
}

pub struct QuizService {
  generator: Arc<QuizGenerator>,
  repository: Arc<dyn QuizRepository>,
  cache: Option<Arc<CachePool>>,
  validator: QuizValidator,
  scorer: QualityScorer,
}

impl QuizService {
  pub fn new(
    generator: Arc<QuizGenerator>,
    repository: Arc<dyn QuizRepository>,
    cache: Option<Arc<CachePool>>,
  ) -> Self {
    Self { generator, repository, cache, validator: QuizValidator::new(), scorer: QualityScorer::new() }
  }

  pub fn generator(&self) -> &Arc<QuizGenerator> {
    &self.generator
  }

  pub fn cache(&self) -> Option<&Arc<CachePool>> {
    self.cache.as_ref()
  }

  /// Next quiz for the request.
  ///
  /// Generation runs in its own task: if the caller goes away mid-flight the
  /// attempt still finishes, and a generated result is parked in the pool for
  /// the next caller instead of being thrown away.
  #[instrument(level = "info", skip(self, req), fields(difficulty = %req.difficulty(), turn = ?req.turn))]
  pub async fn next_quiz(&self, req: QuizRequest) -> Result<Quiz, ServiceError> {
    let difficulty = req.difficulty();
    let generator = self.generator.clone();
    let cache = self.cache.clone();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
      let result = generator.generate(difficulty, &req.infra, &req.options).await;
      if let Err(Ok(quiz)) = tx.send(result) {
        debug!(target: "quiz", quiz_id = %quiz.id, "Caller left before the quiz was ready");
        if quiz.source == QuizSource::Llm {
          if let Some(pool) = cache {
            pool.put(quiz).await;
          }
        }
      }
    });

    let quiz = rx.await.map_err(|_| ServiceError::Aborted)??;
    info!(target: "quiz", %difficulty, quiz_id = %quiz.id, source = ?quiz.source, "Quiz served");
    Ok(quiz)
  }

  /// Check an answer and count it against the quiz.
  #[instrument(level = "info", skip(self, answer), fields(%quiz_id, answer_len = answer.len()))]
  pub async fn submit_answer(&self, quiz_id: Uuid, answer: &str) -> Result<AnswerOutcome, ServiceError> {
    let quiz = self.repository.find(quiz_id).await?;
    let correct = validate_answer(&quiz, answer);
    let updated = self.repository.record_answer(quiz_id, correct).await?;
    info!(target: "quiz", %quiz_id, correct, expected = %quiz.correct_answer, "Answer recorded");
    Ok(AnswerOutcome {
      correct,
      correct_answer: updated.correct_answer.clone(),
      explanation: updated.explanation.clone(),
      accuracy_rate: updated.accuracy_rate(),
      total_answers: updated.total_answer_count,
    })
  }

  /// Accuracy flags for every active quiz, most used first.
  #[instrument(level = "info", skip(self))]
  pub async fn question_quality(&self) -> Result<Vec<QuestionQuality>, ServiceError> {
    let rows: Vec<QuestionQuality> = self.repository.list_active().await?.iter().map(QuestionQuality::from_quiz).collect();
    let flagged = rows
      .iter()
      .filter(|r| matches!(r.quality_flag, QualityFlag::TooEasy | QualityFlag::TooHard))
      .count();
    info!(target: "quiz", quizzes = rows.len(), flagged, "Question quality computed");
    Ok(rows)
  }

  /// Validation and quality score of an arbitrary candidate.
  pub fn assess(&self, quiz: &Quiz, infra: &[String]) -> (ValidationResult, QualityScore) {
    (self.validator.validate(quiz), self.scorer.score(quiz, infra))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::completion::CompletionClient;
  use crate::config::Prompts;
  use crate::error::{CompletionError, GenerationError, RepositoryError};
  use crate::generator::GeneratorSettings;
  use crate::repository::MemoryQuizRepository;
  use crate::seeds::seed_quizzes;
  use async_trait::async_trait;

  struct DownClient;

  #[async_trait]
  impl CompletionClient for DownClient {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
      Err(CompletionError::Status { status: 503, message: "down".into() })
    }
  }

  async fn service(with_seeds: bool) -> (QuizService, Arc<MemoryQuizRepository>) {
    let repo = Arc::new(MemoryQuizRepository::new());
    if with_seeds {
      for quiz in seed_quizzes() {
        repo.save(quiz).await.unwrap();
      }
    }
    let generator = Arc::new(QuizGenerator::new(
      Arc::new(DownClient),
      repo.clone(),
      Prompts::default(),
      GeneratorSettings::default(),
    ));
    (QuizService::new(generator, repo.clone(), None), repo)
  }

  #[test]
  fn answers_compare_trimmed_and_case_insensitive() {
    let ox = Quiz::new(QuizType::Ox, Difficulty::Easy, QuizSource::Fallback).with_answer("true");
    assert!(validate_answer(&ox, "TRUE"));
    assert!(validate_answer(&ox, "  True "));
    assert!(!validate_answer(&ox, "false"));

    let mc = Quiz::new(QuizType::MultipleChoice, Difficulty::Easy, QuizSource::Fallback).with_answer("B");
    assert!(validate_answer(&mc, "b"));
    assert!(!validate_answer(&mc, "A"));
  }

  #[test]
  fn bonus_table() {
    let bonuses: Vec<u32> = (0..=ROUND_SIZE).map(|n| quiz_bonus(n).unwrap()).collect();
    assert_eq!(bonuses, vec![0, 0, 5, 15, 30, 50]);
    assert!(matches!(quiz_bonus(6), Err(ServiceError::BonusOutOfRange(6))));
  }

  #[test]
  fn difficulty_comes_from_turn_unless_given() {
    let req = QuizRequest { turn: Some(22), ..Default::default() };
    assert_eq!(req.difficulty(), Difficulty::Hard);
    let req = QuizRequest { difficulty: Some(Difficulty::Easy), turn: Some(22), ..Default::default() };
    assert_eq!(req.difficulty(), Difficulty::Easy);
    assert_eq!(QuizRequest::default().difficulty(), Difficulty::Medium);
  }

  #[tokio::test]
  async fn next_quiz_serves_fallback_when_model_is_down() {
    let (svc, _) = service(true).await;
    let req = QuizRequest { turn: Some(3), infra: vec!["S3".into()], ..Default::default() };
    let quiz = svc.next_quiz(req).await.unwrap();
    assert_eq!(quiz.difficulty, Difficulty::Easy);
    assert_eq!(quiz.source, QuizSource::Fallback);
    assert_eq!(quiz.infra_context, vec!["S3".to_string()]);
  }

  #[tokio::test]
  async fn next_quiz_reports_exhaustion() {
    let (svc, _) = service(false).await;
    let err = svc.next_quiz(QuizRequest::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Generation(GenerationError::FallbackExhausted { .. })));
  }

  #[tokio::test]
  async fn submitted_answers_update_accuracy() {
    let (svc, repo) = service(true).await;
    let quiz = seed_quizzes().remove(0);
    let quiz = repo.save(quiz).await.unwrap();

    let first = svc.submit_answer(quiz.id, " a ").await.unwrap();
    assert!(first.correct);
    assert_eq!(first.correct_answer, "A");
    assert_eq!(first.accuracy_rate, 100.0);

    let second = svc.submit_answer(quiz.id, "C").await.unwrap();
    assert!(!second.correct);
    assert_eq!(second.accuracy_rate, 50.0);
    assert_eq!(second.total_answers, 2);

    let missing = svc.submit_answer(Uuid::new_v4(), "A").await.unwrap_err();
    assert!(matches!(missing, ServiceError::Repository(RepositoryError::NotFound(_))));
  }

  async fn answer_n(svc: &QuizService, quiz: &Quiz, right: u32, wrong: u32) {
    for _ in 0..right {
      svc.submit_answer(quiz.id, &quiz.correct_answer).await.unwrap();
    }
    for _ in 0..wrong {
      svc.submit_answer(quiz.id, "__wrong__").await.unwrap();
    }
  }

  #[tokio::test]
  async fn question_quality_flags_each_band() {
    let (svc, repo) = service(false).await;
    let mut seeds = seed_quizzes().into_iter();
    let mut next = || seeds.next().unwrap();
    let easy = repo.save(next()).await.unwrap();
    let hard = repo.save(next()).await.unwrap();
    let balanced = repo.save(next()).await.unwrap();
    let sparse = repo.save(next()).await.unwrap();
    let unseen = repo.save(next()).await.unwrap();

    answer_n(&svc, &easy, 18, 2).await;
    answer_n(&svc, &hard, 3, 16).await;
    answer_n(&svc, &balanced, 10, 8).await;
    answer_n(&svc, &sparse, 9, 0).await;

    let rows = svc.question_quality().await.unwrap();
    assert_eq!(rows.len(), 5);
    let by_id = |id: Uuid| rows.iter().find(|r| r.quiz_id == id).unwrap();

    assert_eq!(by_id(easy.id).quality_flag, QualityFlag::TooEasy);
    assert_eq!(by_id(easy.id).accuracy_rate, Some(90.0));
    assert_eq!(by_id(hard.id).quality_flag, QualityFlag::TooHard);
    assert_eq!(by_id(hard.id).accuracy_rate, Some(15.79));
    assert_eq!(by_id(balanced.id).quality_flag, QualityFlag::Balanced);
    assert_eq!(by_id(sparse.id).quality_flag, QualityFlag::InsufficientData);
    assert_eq!(by_id(sparse.id).accuracy_rate, Some(100.0));
    assert_eq!(by_id(unseen.id).quality_flag, QualityFlag::InsufficientData);
    assert_eq!(by_id(unseen.id).accuracy_rate, None);

    // Most used first.
    assert_eq!(rows[0].quiz_id, easy.id);
    assert_eq!(rows[4].quiz_id, unseen.id);
  }

  #[tokio::test]
  async fn tenth_answer_unlocks_the_flag() {
    let (svc, repo) = service(false).await;
    let quiz = repo.save(seed_quizzes().remove(0)).await.unwrap();
    answer_n(&svc, &quiz, 9, 0).await;
    assert_eq!(svc.question_quality().await.unwrap()[0].quality_flag, QualityFlag::InsufficientData);
    answer_n(&svc, &quiz, 1, 0).await;
    assert_eq!(svc.question_quality().await.unwrap()[0].quality_flag, QualityFlag::TooEasy);
  }

  #[test]
  fn long_questions_are_previewed() {
    let quiz = Quiz::new(QuizType::Ox, Difficulty::Easy, QuizSource::Fallback).with_question("가".repeat(120));
    let row = QuestionQuality::from_quiz(&quiz);
    assert_eq!(row.question.chars().count(), 103);
    assert!(row.question.ends_with("..."));
  }
}
