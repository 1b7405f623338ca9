//! The generate → validate → score → persist pipeline.
//!
//! One `generate` call draws the quiz type once, then runs up to
//! `max_attempts` strictly sequential attempts against the completion client.
//! The first candidate that passes validation and clears the quality gate is
//! persisted and returned. Per-attempt failures only feed metrics and logs;
//! when every attempt fails the best-matching fallback from the repository is
//! served, and only an empty fallback bank surfaces as an error.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CachePool, QuizProducer};
use crate::completion::CompletionClient;
use crate::config::{PipelineSettings, Prompts};
use crate::domain::{Difficulty, GeneratedQuiz, Quiz, QuizType};
use crate::error::GenerationError;
use crate::metrics::GenerationMetrics;
use crate::prompt::{build_prompt, extract_json};
use crate::reference::ReferenceContext;
use crate::repository::{FallbackQuery, QuizRepository};
use crate::scorer::QualityScorer;
use crate::util::{normalize_tags, trunc_for_log};
use crate::validator::QuizValidator;

/// Share of multiple-choice questions when the caller doesn't force a type.
pub const MULTIPLE_CHOICE_RATIO: f64 = 0.7;

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorSettings {
  pub enabled: bool,
  pub max_attempts: u32,
  pub min_quality_score: u32,
}

impl Default for GeneratorSettings {
  fn default() -> Self {
    Self::from(&PipelineSettings::default())
  }
}

impl From<&PipelineSettings> for GeneratorSettings {
  fn from(p: &PipelineSettings) -> Self {
    Self {
      enabled: p.enabled,
      max_attempts: p.max_attempts.max(1),
      min_quality_score: p.min_quality_score,
    }
  }
}

#[derive(Clone, Debug)]
pub struct GenerateOptions {
  /// Try the pool before generating.
  pub use_cache: bool,
  /// Force a type instead of the 70/30 draw.
  pub quiz_type: Option<QuizType>,
  /// Ids the caller has already seen; excluded from fallback selection.
  pub exclude_ids: Vec<Uuid>,
}

impl Default for GenerateOptions {
  fn default() -> Self {
    Self { use_cache: true, quiz_type: None, exclude_ids: Vec::new() }
  }
}

pub struct QuizGenerator {
  client: Arc<dyn CompletionClient>,
  repository: Arc<dyn QuizRepository>,
  cache: Option<Arc<CachePool>>,
  reference: Option<Arc<ReferenceContext>>,
  metrics: Arc<GenerationMetrics>,
  validator: QuizValidator,
  scorer: QualityScorer,
  prompts: Prompts,
  settings: GeneratorSettings,
}

impl QuizGenerator {
  pub fn new(
    client: Arc<dyn CompletionClient>,
    repository: Arc<dyn QuizRepository>,
    prompts: Prompts,
    settings: GeneratorSettings,
  ) -> Self {
    Self {
      client,
      repository,
      cache: None,
      reference: None,
      metrics: Arc::new(GenerationMetrics::new()),
      validator: QuizValidator::new(),
      scorer: QualityScorer::new(),
      prompts,
      settings,
    }
  }

  pub fn with_cache(mut self, cache: Arc<CachePool>) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn with_reference(mut self, reference: Arc<ReferenceContext>) -> Self {
    self.reference = Some(reference);
    self
  }

  pub fn with_metrics(mut self, metrics: Arc<GenerationMetrics>) -> Self {
    self.metrics = metrics;
    self
  }

  pub fn metrics(&self) -> &Arc<GenerationMetrics> {
    &self.metrics
  }

  pub fn settings(&self) -> &GeneratorSettings {
    &self.settings
  }

  /// A usable quiz for `difficulty`: pooled, freshly generated or fallback.
  /// The only error is `FallbackExhausted`.
  #[instrument(level = "info", skip(self, infra, options), fields(%difficulty, infra = ?infra))]
  pub async fn generate(
    &self,
    difficulty: Difficulty,
    infra: &[String],
    options: &GenerateOptions,
  ) -> Result<Quiz, GenerationError> {
    let start = Instant::now();
    self.metrics.record_request();

    if !self.settings.enabled {
      debug!(target: "quiz", %difficulty, "Generation disabled; serving fallback");
      return self.serve_fallback(difficulty, infra, &options.exclude_ids).await;
    }

    if options.use_cache {
      if let Some(pool) = &self.cache {
        if let Some(quiz) = pool.get(difficulty, infra).await {
          info!(target: "quiz", %difficulty, quiz_id = %quiz.id, "Serving pooled quiz");
          return Ok(quiz);
        }
      }
    }

    let quiz_type = options.quiz_type.unwrap_or_else(pick_quiz_type);
    match self.run_attempts(difficulty, quiz_type, infra).await {
      Ok(quiz) => Ok(self.accept(quiz, start).await),
      Err(last) => {
        warn!(target: "quiz", %difficulty, %quiz_type, category = last.category(), error = %last, "All generation attempts failed");
        self.serve_fallback(difficulty, infra, &options.exclude_ids).await
      }
    }
  }

  /// Generate without consulting the pool or the fallback bank. Used for
  /// refills, where a failure is better than caching a fallback.
  #[instrument(level = "info", skip(self, infra), fields(%difficulty))]
  pub async fn generate_fresh(
    &self,
    difficulty: Difficulty,
    infra: &[String],
    quiz_type: Option<QuizType>,
  ) -> Result<Quiz, GenerationError> {
    let start = Instant::now();
    self.metrics.record_request();
    let quiz_type = quiz_type.unwrap_or_else(pick_quiz_type);
    match self.run_attempts(difficulty, quiz_type, infra).await {
      Ok(quiz) => Ok(self.accept(quiz, start).await),
      Err(e) => {
        self.metrics.record_failure();
        Err(e)
      }
    }
  }

  // Sequential attempts; the error is the last attempt's.
  async fn run_attempts(
    &self,
    difficulty: Difficulty,
    quiz_type: QuizType,
    infra: &[String],
  ) -> Result<Quiz, GenerationError> {
    let reference = match &self.reference {
      Some(r) => Some(r.context_for(infra).await),
      None => None,
    };
    let prompt = build_prompt(&self.prompts, quiz_type, difficulty, infra, reference.as_deref());
    let attempts = self.settings.max_attempts.max(1);

    let mut last = None;
    for attempt in 1..=attempts {
      self.metrics.record_attempt();
      debug!(target: "quiz", attempt, attempts, %quiz_type, %difficulty, model = self.client.model_name(), "Generation attempt");
      match self.attempt(&prompt, quiz_type, difficulty, infra).await {
        Ok(quiz) => {
          debug!(target: "quiz", attempt, quality = ?quiz.quality_score, "Candidate accepted");
          return Ok(quiz);
        }
        Err(e) => {
          self.record_attempt_failure(&e);
          warn!(target: "quiz", attempt, attempts, category = e.category(), error = %e, "Generation attempt failed");
          last = Some(e);
        }
      }
    }
    Err(last.unwrap_or_else(|| GenerationError::ParseFailure("no attempt was made".into())))
  }

  async fn attempt(
    &self,
    prompt: &str,
    quiz_type: QuizType,
    difficulty: Difficulty,
    infra: &[String],
  ) -> Result<Quiz, GenerationError> {
    let raw = self.client.complete(prompt).await?;
    let json = extract_json(&raw).map_err(|e| {
      debug!(target: "quiz", preview = %trunc_for_log(&raw, 120), "Unparseable model output");
      GenerationError::ParseFailure(e)
    })?;
    let parsed: GeneratedQuiz =
      serde_json::from_str(json).map_err(|e| GenerationError::ParseFailure(e.to_string()))?;

    let mut quiz = Quiz::from_generated(parsed, quiz_type, difficulty, infra);
    let validation = self.validator.validate(&quiz);
    if !validation.is_valid {
      return Err(GenerationError::ValidationFailure(validation.errors));
    }
    if !validation.warnings.is_empty() {
      debug!(target: "quiz", warnings = ?validation.warnings, "Candidate has advisory warnings");
    }

    let score = self.scorer.score(&quiz, infra);
    quiz.quality_score = Some(score.total);
    if score.total < self.settings.min_quality_score {
      debug!(target: "quiz", suggestions = ?score.suggestions, "Candidate below quality gate");
      return Err(GenerationError::QualityFailure { score: score.total, min: self.settings.min_quality_score });
    }
    Ok(quiz)
  }

  fn record_attempt_failure(&self, e: &GenerationError) {
    match e {
      GenerationError::CompletionFailure(_) => self.metrics.record_llm_failure(),
      GenerationError::ParseFailure(_) => self.metrics.record_parse_failure(),
      GenerationError::ValidationFailure(_) => self.metrics.record_validation_failure(),
      GenerationError::QualityFailure { .. } => self.metrics.record_quality_failure(),
      GenerationError::FallbackExhausted { .. } => {}
    }
  }

  // Persist and count an accepted candidate. A storage failure is logged; the
  // quiz is still returned.
  async fn accept(&self, quiz: Quiz, start: Instant) -> Quiz {
    let quality = quiz.quality_score.unwrap_or_default();
    let quiz = match self.repository.save(quiz.clone()).await {
      Ok(saved) => saved,
      Err(e) => {
        error!(target: "quiz", quiz_id = %quiz.id, error = %e, "Failed to persist generated quiz");
        quiz
      }
    };
    let elapsed = start.elapsed();
    self.metrics.record_success(elapsed.as_millis() as u64, quality);
    info!(target: "quiz", quiz_id = %quiz.id, difficulty = %quiz.difficulty, quality, ?elapsed, "Generated quiz");
    quiz
  }

  async fn serve_fallback(
    &self,
    difficulty: Difficulty,
    infra: &[String],
    exclude: &[Uuid],
  ) -> Result<Quiz, GenerationError> {
    self.metrics.record_fallback();
    self.metrics.record_failure();

    let query = FallbackQuery::new(difficulty).excluding(exclude.iter().copied());
    let rows = match self.repository.find_fallbacks(&query).await {
      Ok(rows) => rows,
      Err(e) => {
        error!(target: "quiz", %difficulty, error = %e, "Fallback query failed");
        Vec::new()
      }
    };
    match best_fallback(rows, infra) {
      Some(quiz) => {
        info!(target: "quiz", %difficulty, quiz_id = %quiz.id, "Serving fallback quiz");
        Ok(quiz)
      }
      None => {
        error!(target: "quiz", %difficulty, "No fallback quiz available");
        Err(GenerationError::FallbackExhausted { difficulty: difficulty.to_string() })
      }
    }
  }
}

#[async_trait]
impl QuizProducer for QuizGenerator {
  async fn produce(&self, difficulty: Difficulty) -> Result<Quiz, GenerationError> {
    self.generate_fresh(difficulty, &[], None).await
  }
}

fn pick_quiz_type() -> QuizType {
  if rand::thread_rng().gen_bool(MULTIPLE_CHOICE_RATIO) {
    QuizType::MultipleChoice
  } else {
    QuizType::Ox
  }
}

/// Row sharing the most infra tags with the request; the first row wins ties
/// and when no tags were requested.
pub fn best_fallback(rows: Vec<Quiz>, infra: &[String]) -> Option<Quiz> {
  let wanted = normalize_tags(infra);
  let mut best: Option<(usize, Quiz)> = None;
  for quiz in rows {
    let shared = normalize_tags(&quiz.infra_context)
      .iter()
      .filter(|t| wanted.contains(*t))
      .count();
    if best.as_ref().map_or(true, |(b, _)| shared > *b) {
      best = Some((shared, quiz));
    }
  }
  best.map(|(_, quiz)| quiz)
}
