//! Quiz persistence: accepted generations, the fallback bank and per-quiz
//! answer statistics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{Difficulty, Quiz, QuizSource};
use crate::error::RepositoryError;

/// Fallback rows returned per query at most.
pub const FALLBACK_LIMIT: usize = 10;

/// Active `FALLBACK` quizzes of one difficulty, minus ids the caller already saw.
#[derive(Clone, Debug, Default)]
pub struct FallbackQuery {
  pub difficulty: Option<Difficulty>,
  pub exclude_ids: Vec<Uuid>,
}

impl FallbackQuery {
  pub fn new(difficulty: Difficulty) -> Self {
    Self { difficulty: Some(difficulty), exclude_ids: Vec::new() }
  }

  pub fn excluding(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
    self.exclude_ids.extend(ids);
    self
  }
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
  /// Insert or replace by id.
  async fn save(&self, quiz: Quiz) -> Result<Quiz, RepositoryError>;

  async fn find(&self, id: Uuid) -> Result<Quiz, RepositoryError>;

  /// Least-used first, random among equals, at most `FALLBACK_LIMIT` rows.
  async fn find_fallbacks(&self, query: &FallbackQuery) -> Result<Vec<Quiz>, RepositoryError>;

  /// Count one answer (and one use) against a quiz; returns the updated row.
  async fn record_answer(&self, id: Uuid, correct: bool) -> Result<Quiz, RepositoryError>;

  /// Every active quiz, most used first.
  async fn list_active(&self) -> Result<Vec<Quiz>, RepositoryError>;

  async fn count(&self) -> Result<usize, RepositoryError>;
}

/// In-memory repository: rows by id plus an id index per difficulty.
#[derive(Clone, Default)]
pub struct MemoryQuizRepository {
  by_id: Arc<RwLock<HashMap<Uuid, Quiz>>>,
  by_diff: Arc<RwLock<HashMap<Difficulty, Vec<Uuid>>>>,
}

impl MemoryQuizRepository {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl QuizRepository for MemoryQuizRepository {
  #[instrument(level = "debug", skip(self, quiz), fields(quiz_id = %quiz.id))]
  async fn save(&self, quiz: Quiz) -> Result<Quiz, RepositoryError> {
    let mut by_id = self.by_id.write().await;
    let mut by_diff = self.by_diff.write().await;
    if let Some(prev) = by_id.get(&quiz.id) {
      if prev.difficulty != quiz.difficulty {
        if let Some(ids) = by_diff.get_mut(&prev.difficulty) {
          ids.retain(|id| *id != quiz.id);
        }
        by_diff.entry(quiz.difficulty).or_default().push(quiz.id);
      }
    } else {
      by_diff.entry(quiz.difficulty).or_default().push(quiz.id);
    }
    by_id.insert(quiz.id, quiz.clone());
    Ok(quiz)
  }

  async fn find(&self, id: Uuid) -> Result<Quiz, RepositoryError> {
    self.by_id.read().await.get(&id).cloned().ok_or(RepositoryError::NotFound(id))
  }

  async fn find_fallbacks(&self, query: &FallbackQuery) -> Result<Vec<Quiz>, RepositoryError> {
    let excluded: HashSet<&Uuid> = query.exclude_ids.iter().collect();
    let mut rows: Vec<Quiz> = {
      let by_id = self.by_id.read().await;
      let by_diff = self.by_diff.read().await;
      let ids: Vec<Uuid> = match query.difficulty {
        Some(d) => by_diff.get(&d).cloned().unwrap_or_default(),
        None => by_id.keys().copied().collect(),
      };
      ids
        .iter()
        .filter(|id| !excluded.contains(id))
        .filter_map(|id| by_id.get(id))
        .filter(|q| q.is_active && q.source == QuizSource::Fallback)
        .cloned()
        .collect()
    };
    rows.shuffle(&mut rand::thread_rng());
    rows.sort_by_key(|q| q.usage_count);
    rows.truncate(FALLBACK_LIMIT);
    debug!(target: "quiz", difficulty = ?query.difficulty, excluded = excluded.len(), found = rows.len(), "Fallback query");
    Ok(rows)
  }

  async fn record_answer(&self, id: Uuid, correct: bool) -> Result<Quiz, RepositoryError> {
    let mut by_id = self.by_id.write().await;
    let quiz = by_id.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
    quiz.usage_count += 1;
    quiz.total_answer_count += 1;
    if correct {
      quiz.correct_answer_count += 1;
    }
    Ok(quiz.clone())
  }

  async fn list_active(&self) -> Result<Vec<Quiz>, RepositoryError> {
    let mut rows: Vec<Quiz> = self.by_id.read().await.values().filter(|q| q.is_active).cloned().collect();
    rows.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then(a.created_at.cmp(&b.created_at)));
    Ok(rows)
  }

  async fn count(&self) -> Result<usize, RepositoryError> {
    Ok(self.by_id.read().await.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuizType;

  fn fallback(difficulty: Difficulty, usage: u32) -> Quiz {
    let mut q = Quiz::new(QuizType::Ox, difficulty, QuizSource::Fallback);
    q.usage_count = usage;
    q
  }

  #[tokio::test]
  async fn fallbacks_filter_and_order_by_usage() {
    let repo = MemoryQuizRepository::new();
    let worn = repo.save(fallback(Difficulty::Easy, 5)).await.unwrap();
    let fresh = repo.save(fallback(Difficulty::Easy, 0)).await.unwrap();
    repo.save(fallback(Difficulty::Hard, 0)).await.unwrap();
    repo.save(Quiz::new(QuizType::Ox, Difficulty::Easy, QuizSource::Llm)).await.unwrap();
    let mut inactive = fallback(Difficulty::Easy, 0);
    inactive.is_active = false;
    repo.save(inactive).await.unwrap();

    let rows = repo.find_fallbacks(&FallbackQuery::new(Difficulty::Easy)).await.unwrap();
    let ids: Vec<Uuid> = rows.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![fresh.id, worn.id]);

    let rows = repo
      .find_fallbacks(&FallbackQuery::new(Difficulty::Easy).excluding([fresh.id]))
      .await
      .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, worn.id);
  }

  #[tokio::test]
  async fn fallback_results_are_capped() {
    let repo = MemoryQuizRepository::new();
    for _ in 0..15 {
      repo.save(fallback(Difficulty::Medium, 0)).await.unwrap();
    }
    let rows = repo.find_fallbacks(&FallbackQuery::new(Difficulty::Medium)).await.unwrap();
    assert_eq!(rows.len(), FALLBACK_LIMIT);
  }

  #[tokio::test]
  async fn answers_update_counters() {
    let repo = MemoryQuizRepository::new();
    let quiz = repo.save(fallback(Difficulty::Easy, 0)).await.unwrap();
    repo.record_answer(quiz.id, true).await.unwrap();
    let updated = repo.record_answer(quiz.id, false).await.unwrap();
    assert_eq!(updated.usage_count, 2);
    assert_eq!(updated.total_answer_count, 2);
    assert_eq!(updated.correct_answer_count, 1);
    assert_eq!(updated.accuracy_rate(), 50.0);

    let missing = Uuid::new_v4();
    assert!(matches!(repo.record_answer(missing, true).await, Err(RepositoryError::NotFound(id)) if id == missing));
  }

  #[tokio::test]
  async fn active_rows_are_listed_most_used_first() {
    let repo = MemoryQuizRepository::new();
    let light = repo.save(fallback(Difficulty::Easy, 1)).await.unwrap();
    let heavy = repo.save(fallback(Difficulty::Hard, 7)).await.unwrap();
    let mut retired = fallback(Difficulty::Medium, 50);
    retired.is_active = false;
    repo.save(retired).await.unwrap();

    let ids: Vec<Uuid> = repo.list_active().await.unwrap().iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![heavy.id, light.id]);
  }

  #[tokio::test]
  async fn resaving_keeps_a_single_row() {
    let repo = MemoryQuizRepository::new();
    let mut quiz = repo.save(fallback(Difficulty::Easy, 0)).await.unwrap();
    quiz.difficulty = Difficulty::Hard;
    repo.save(quiz.clone()).await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 1);
    assert!(repo.find_fallbacks(&FallbackQuery::new(Difficulty::Easy)).await.unwrap().is_empty());
    assert_eq!(repo.find_fallbacks(&FallbackQuery::new(Difficulty::Hard)).await.unwrap().len(), 1);
  }
}
