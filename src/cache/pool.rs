//! Per-difficulty pool of pre-validated quizzes.
//!
//! Entries are single-use: `get` removes what it returns. Reads pick the entry
//! whose infra tags best match the caller's, and a pool that runs low asks the
//! background refill worker for more without delaying the caller. Store
//! failures never escape; they count as misses.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cache::store::CacheStore;
use crate::config::PipelineSettings;
use crate::domain::{Difficulty, Quiz};
use crate::error::{CacheError, GenerationError};
use crate::scorer::QualityScorer;
use crate::util::normalize_tags;
use crate::validator::QuizValidator;

const HITS_KEY: &str = "quiz:stats:hits";
const MISSES_KEY: &str = "quiz:stats:misses";
const REFRESH_KEY: &str = "quiz:stats:refresh";

// Rescans allowed when another reader removes our pick first.
const MAX_TAKE_ROUNDS: usize = 3;
// A refill run gives up after this many failed productions in a row.
const MAX_CONSECUTIVE_FAILURES: usize = 3;
const REFILL_QUEUE: usize = 16;

fn pool_key(difficulty: Difficulty) -> String {
  format!("quiz:pool:{}", difficulty.as_str())
}

/// Something that can produce a fresh, already-gated quiz for the pool.
#[async_trait]
pub trait QuizProducer: Send + Sync {
  async fn produce(&self, difficulty: Difficulty) -> Result<Quiz, GenerationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefillRequest {
  pub difficulty: Difficulty,
  pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoolSettings {
  pub pool_size: usize,
  pub refresh_threshold: usize,
  pub min_quality_score: u32,
}

impl Default for PoolSettings {
  fn default() -> Self {
    Self::from(&PipelineSettings::default())
  }
}

impl From<&PipelineSettings> for PoolSettings {
  fn from(p: &PipelineSettings) -> Self {
    Self {
      pool_size: p.pool_size.max(1),
      refresh_threshold: p.refresh_threshold,
      min_quality_score: p.min_quality_score,
    }
  }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolEntry {
  #[serde(flatten)]
  quiz: Quiz,
  cached_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub struct PoolSizes {
  pub easy: usize,
  pub medium: usize,
  pub hard: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  /// Percentage with two decimals.
  pub hit_rate: f64,
  pub pool_sizes: PoolSizes,
  pub total_cached: usize,
  pub last_refresh: Option<DateTime<Utc>>,
}

pub struct CachePool {
  store: Arc<dyn CacheStore>,
  settings: PoolSettings,
  validator: QuizValidator,
  scorer: QualityScorer,
  hits: AtomicU64,
  misses: AtomicU64,
  refill_tx: Option<mpsc::Sender<RefillRequest>>,
  in_flight: [AtomicBool; 3],
}

impl CachePool {
  /// Pool without background refill; `preload` becomes a no-op.
  pub fn new(store: Arc<dyn CacheStore>, settings: PoolSettings) -> Self {
    Self::build(store, settings, None)
  }

  /// Pool wired to a refill queue. Hand the receiver to `spawn_refill_worker`.
  pub fn with_refill(
    store: Arc<dyn CacheStore>,
    settings: PoolSettings,
  ) -> (Self, mpsc::Receiver<RefillRequest>) {
    let (tx, rx) = mpsc::channel(REFILL_QUEUE);
    (Self::build(store, settings, Some(tx)), rx)
  }

  fn build(
    store: Arc<dyn CacheStore>,
    settings: PoolSettings,
    refill_tx: Option<mpsc::Sender<RefillRequest>>,
  ) -> Self {
    Self {
      store,
      settings,
      validator: QuizValidator::new(),
      scorer: QualityScorer::new(),
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
      refill_tx,
      in_flight: Default::default(),
    }
  }

  pub fn settings(&self) -> &PoolSettings {
    &self.settings
  }

  /// Take the best-matching quiz for `difficulty`, or `None` on a miss.
  #[instrument(level = "debug", skip(self, infra), fields(%difficulty, infra_len = infra.len()))]
  pub async fn get(&self, difficulty: Difficulty, infra: &[String]) -> Option<Quiz> {
    let key = pool_key(difficulty);
    let len = match self.store.llen(&key).await {
      Ok(n) => n,
      Err(e) => {
        warn!(target: "quiz_cache", %difficulty, error = %e, "Pool length lookup failed; treating as miss");
        self.count_miss().await;
        return None;
      }
    };
    if len == 0 {
      debug!(target: "quiz_cache", %difficulty, "Cache miss (empty pool)");
      self.count_miss().await;
      self.preload(difficulty, self.settings.pool_size);
      return None;
    }

    let taken = match self.take_best(&key, infra).await {
      Ok(found) => found,
      Err(e) => {
        warn!(target: "quiz_cache", %difficulty, error = %e, "Best-match scan failed; popping oldest entry");
        self.take_oldest(&key).await
      }
    };
    let Some((quiz, score)) = taken else {
      debug!(target: "quiz_cache", %difficulty, "Cache miss");
      self.count_miss().await;
      return None;
    };

    self.count_hit().await;
    info!(target: "quiz_cache", %difficulty, quiz_id = %quiz.id, match_score = score, "Cache hit");

    match self.store.llen(&key).await {
      Ok(remaining) if remaining < self.settings.refresh_threshold => {
        debug!(target: "quiz_cache", %difficulty, remaining, "Pool below refresh threshold");
        self.preload(difficulty, self.settings.pool_size.saturating_sub(remaining));
      }
      Ok(_) => {}
      Err(e) => warn!(target: "quiz_cache", %difficulty, error = %e, "Pool length lookup failed after hit"),
    }
    Some(quiz)
  }

  async fn take_best(&self, key: &str, infra: &[String]) -> Result<Option<(Quiz, u32)>, CacheError> {
    for _ in 0..MAX_TAKE_ROUNDS {
      let raw = self.store.lrange(key, 0, -1).await?;
      let mut best: Option<(usize, u32, Quiz)> = None;
      for (idx, item) in raw.iter().enumerate() {
        let entry: PoolEntry = serde_json::from_str(item)?;
        let score = match_score(&entry.quiz.infra_context, infra);
        if best.as_ref().map_or(true, |(_, b, _)| score > *b) {
          best = Some((idx, score, entry.quiz));
        }
      }
      let Some((idx, score, quiz)) = best else {
        return Ok(None);
      };
      if self.store.lrem(key, 1, &raw[idx]).await? == 1 {
        return Ok(Some((quiz, score)));
      }
      debug!(target: "quiz_cache", quiz_id = %quiz.id, "Entry taken by a concurrent reader; rescanning");
    }
    Err(CacheError::Store("pool kept changing under concurrent readers".into()))
  }

  /// Pop from the old end, skipping (and dropping) corrupt entries.
  async fn take_oldest(&self, key: &str) -> Option<(Quiz, u32)> {
    for _ in 0..MAX_TAKE_ROUNDS {
      match self.store.rpop(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<PoolEntry>(&raw) {
          Ok(entry) => return Some((entry.quiz, 0)),
          Err(e) => warn!(target: "quiz_cache", error = %e, "Dropping corrupt pool entry"),
        },
        Ok(None) => return None,
        Err(e) => {
          warn!(target: "quiz_cache", error = %e, "Fallback pop failed");
          return None;
        }
      }
    }
    None
  }

  /// Add a quiz to its pool. Returns false (and stores nothing) when the quiz
  /// fails validation, sits below the quality gate or the store errors.
  #[instrument(level = "debug", skip(self, quiz), fields(quiz_id = %quiz.id, difficulty = %quiz.difficulty))]
  pub async fn put(&self, mut quiz: Quiz) -> bool {
    let validation = self.validator.validate(&quiz);
    if !validation.is_valid {
      debug!(target: "quiz_cache", errors = ?validation.errors, "Not caching invalid quiz");
      return false;
    }
    let quality = match quiz.quality_score {
      Some(q) => q,
      None => self.scorer.score(&quiz, &quiz.infra_context).total,
    };
    if quality < self.settings.min_quality_score {
      debug!(target: "quiz_cache", quality, min = self.settings.min_quality_score, "Not caching low-quality quiz");
      return false;
    }
    quiz.quality_score = Some(quality);

    let key = pool_key(quiz.difficulty);
    let entry = PoolEntry { quiz, cached_at: Utc::now() };
    match self.push_entry(&key, &entry).await {
      Ok(len) => {
        debug!(target: "quiz_cache", pool_len = len, quality, "Quiz cached");
        true
      }
      Err(e) => {
        warn!(target: "quiz_cache", error = %e, "Failed to cache quiz");
        false
      }
    }
  }

  async fn push_entry(&self, key: &str, entry: &PoolEntry) -> Result<usize, CacheError> {
    let raw = serde_json::to_string(entry)?;
    let len = self.store.lpush(key, raw).await?;
    let cap = self.settings.pool_size;
    if len > cap {
      self.store.ltrim(key, 0, cap as isize - 1).await?;
    }
    Ok(len.min(cap))
  }

  /// Ask the background worker for `count` more quizzes. Never blocks; at most
  /// one refill per difficulty is queued or running at a time.
  pub fn preload(&self, difficulty: Difficulty, count: usize) {
    if count == 0 {
      return;
    }
    let Some(tx) = &self.refill_tx else {
      debug!(target: "quiz_cache", %difficulty, "No refill worker configured; skipping preload");
      return;
    };
    let flag = &self.in_flight[difficulty.index()];
    if flag.swap(true, Ordering::AcqRel) {
      debug!(target: "quiz_cache", %difficulty, "Refill already in flight; coalesced");
      return;
    }
    if let Err(e) = tx.try_send(RefillRequest { difficulty, count }) {
      flag.store(false, Ordering::Release);
      warn!(target: "quiz_cache", %difficulty, error = %e, "Could not queue refill");
    }
  }

  /// Produce and cache up to `count` quizzes; returns how many were cached.
  #[instrument(level = "info", skip(self, producer), fields(%difficulty, count))]
  pub async fn refill(&self, producer: &dyn QuizProducer, difficulty: Difficulty, count: usize) -> usize {
    let start = Instant::now();
    info!(target: "quiz_cache", %difficulty, count, "Refill started");
    let mut cached = 0;
    let mut failures_in_row = 0;
    for _ in 0..count {
      match producer.produce(difficulty).await {
        Ok(quiz) => {
          failures_in_row = 0;
          if self.put(quiz).await {
            cached += 1;
          }
        }
        Err(e) => {
          failures_in_row += 1;
          warn!(target: "quiz_cache", %difficulty, category = e.category(), error = %e, "Refill production failed");
          if failures_in_row >= MAX_CONSECUTIVE_FAILURES {
            warn!(target: "quiz_cache", %difficulty, "Giving up on this refill run");
            break;
          }
        }
      }
    }
    if let Err(e) = self.store.set(REFRESH_KEY, Utc::now().to_rfc3339()).await {
      warn!(target: "quiz_cache", error = %e, "Failed to record refresh time");
    }
    info!(target: "quiz_cache", %difficulty, cached, elapsed = ?start.elapsed(), "Refill finished");
    cached
  }

  fn finish_refill(&self, difficulty: Difficulty) {
    self.in_flight[difficulty.index()].store(false, Ordering::Release);
  }

  /// Queue a top-up for every difficulty that is below target size.
  pub async fn warm(&self) -> usize {
    let mut requested = 0;
    for difficulty in Difficulty::ALL {
      let len = self.store.llen(&pool_key(difficulty)).await.unwrap_or(0);
      let missing = self.settings.pool_size.saturating_sub(len);
      if missing > 0 {
        self.preload(difficulty, missing);
        requested += missing;
      }
    }
    info!(target: "quiz_cache", requested, "Cache warm-up queued");
    requested
  }

  /// Drop every pool and counter.
  pub async fn clear(&self) {
    let keys = Difficulty::ALL
      .iter()
      .map(|d| pool_key(*d))
      .chain([HITS_KEY, MISSES_KEY, REFRESH_KEY].map(String::from));
    for key in keys {
      if let Err(e) = self.store.del(&key).await {
        warn!(target: "quiz_cache", %key, error = %e, "Failed to clear cache key");
      }
    }
    self.hits.store(0, Ordering::Relaxed);
    self.misses.store(0, Ordering::Relaxed);
    info!(target: "quiz_cache", "Quiz cache cleared");
  }

  pub async fn stats(&self) -> CacheStats {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total = hits + misses;
    let hit_rate = if total == 0 {
      0.0
    } else {
      (hits as f64 / total as f64 * 10_000.0).round() / 100.0
    };

    let mut sizes = [0usize; 3];
    for difficulty in Difficulty::ALL {
      sizes[difficulty.index()] = self.store.llen(&pool_key(difficulty)).await.unwrap_or(0);
    }
    let last_refresh = self
      .store
      .get(REFRESH_KEY)
      .await
      .ok()
      .flatten()
      .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
      .map(|d| d.with_timezone(&Utc));

    CacheStats {
      hits,
      misses,
      hit_rate,
      pool_sizes: PoolSizes { easy: sizes[0], medium: sizes[1], hard: sizes[2] },
      total_cached: sizes.iter().sum(),
      last_refresh,
    }
  }

  async fn count_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
    if let Err(e) = self.store.incr(HITS_KEY).await {
      debug!(target: "quiz_cache", error = %e, "Hit counter not persisted");
    }
  }

  async fn count_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
    if let Err(e) = self.store.incr(MISSES_KEY).await {
      debug!(target: "quiz_cache", error = %e, "Miss counter not persisted");
    }
  }
}

/// Infra overlap between a cached quiz and a request, 0..=100.
///
/// `round(100 * (0.6 * |A∩B| / |A| + 0.4 * |A∩B| / |B|))` over case-insensitive
/// tag sets; 0 when either side is empty.
pub fn match_score(quiz_infra: &[String], request_infra: &[String]) -> u32 {
  let quiz: HashSet<String> = normalize_tags(quiz_infra).into_iter().collect();
  let request: HashSet<String> = normalize_tags(request_infra).into_iter().collect();
  if quiz.is_empty() || request.is_empty() {
    return 0;
  }
  let shared = quiz.intersection(&request).count() as f64;
  let score = 0.6 * shared / quiz.len() as f64 + 0.4 * shared / request.len() as f64;
  (score * 100.0).round() as u32
}

// Clears the in-flight flag however the refill task ends, panics included.
struct RefillDone {
  pool: Arc<CachePool>,
  difficulty: Difficulty,
}

impl Drop for RefillDone {
  fn drop(&mut self) {
    self.pool.finish_refill(self.difficulty);
  }
}

/// Run refill requests in the background, one task per request.
///
/// The worker holds weak handles so it winds down once the pool (and with it
/// the only sender) is dropped.
pub fn spawn_refill_worker(
  pool: &Arc<CachePool>,
  producer: &Arc<dyn QuizProducer>,
  mut rx: mpsc::Receiver<RefillRequest>,
) -> JoinHandle<()> {
  let pool: Weak<CachePool> = Arc::downgrade(pool);
  let producer: Weak<dyn QuizProducer> = Arc::downgrade(producer);
  tokio::spawn(async move {
    while let Some(req) = rx.recv().await {
      let (Some(pool), Some(producer)) = (pool.upgrade(), producer.upgrade()) else {
        break;
      };
      tokio::spawn(async move {
        let _done = RefillDone { pool: pool.clone(), difficulty: req.difficulty };
        pool.refill(producer.as_ref(), req.difficulty, req.count).await;
      });
    }
    debug!(target: "quiz_cache", "Refill worker stopped");
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::store::MemoryStore;
  use crate::seeds::seed_quizzes;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;
  use tokio::task::JoinSet;

  fn seed(difficulty: Difficulty, infra: &[&str]) -> Quiz {
    let mut quiz = seed_quizzes()
      .into_iter()
      .find(|q| q.difficulty == difficulty)
      .unwrap();
    quiz.infra_context = infra.iter().map(|s| s.to_string()).collect();
    quiz.quality_score = Some(90);
    quiz
  }

  fn tags(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn memory_pool() -> CachePool {
    CachePool::new(Arc::new(MemoryStore::new()), PoolSettings::default())
  }

  struct BrokenStore;

  #[async_trait]
  impl CacheStore for BrokenStore {
    async fn lpush(&self, _: &str, _: String) -> Result<usize, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn ltrim(&self, _: &str, _: isize, _: isize) -> Result<(), CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn lrange(&self, _: &str, _: isize, _: isize) -> Result<Vec<String>, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn lrem(&self, _: &str, _: usize, _: &str) -> Result<usize, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn rpop(&self, _: &str) -> Result<Option<String>, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn llen(&self, _: &str) -> Result<usize, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn incr(&self, _: &str) -> Result<u64, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn set(&self, _: &str, _: String) -> Result<(), CacheError> {
      Err(CacheError::Store("down".into()))
    }
    async fn del(&self, _: &str) -> Result<(), CacheError> {
      Err(CacheError::Store("down".into()))
    }
  }

  struct SeedProducer {
    calls: AtomicUsize,
  }

  #[async_trait]
  impl QuizProducer for SeedProducer {
    async fn produce(&self, difficulty: Difficulty) -> Result<Quiz, GenerationError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(seed(difficulty, &["EC2"]))
    }
  }

  /// Memory store where another reader grabs the picked entry right before
  /// the first `lrem` lands.
  struct StealingStore {
    inner: MemoryStore,
    stolen: AtomicUsize,
  }

  #[async_trait]
  impl CacheStore for StealingStore {
    async fn lpush(&self, key: &str, value: String) -> Result<usize, CacheError> {
      self.inner.lpush(key, value).await
    }
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), CacheError> {
      self.inner.ltrim(key, start, stop).await
    }
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, CacheError> {
      self.inner.lrange(key, start, stop).await
    }
    async fn lrem(&self, key: &str, count: usize, value: &str) -> Result<usize, CacheError> {
      if self.stolen.fetch_add(1, Ordering::SeqCst) == 0 {
        self.inner.lrem(key, count, value).await?;
      }
      self.inner.lrem(key, count, value).await
    }
    async fn rpop(&self, key: &str) -> Result<Option<String>, CacheError> {
      self.inner.rpop(key).await
    }
    async fn llen(&self, key: &str) -> Result<usize, CacheError> {
      self.inner.llen(key).await
    }
    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
      self.inner.incr(key).await
    }
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
      self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
      self.inner.set(key, value).await
    }
    async fn del(&self, key: &str) -> Result<(), CacheError> {
      self.inner.del(key).await
    }
  }

  struct PanickingProducer;

  #[async_trait]
  impl QuizProducer for PanickingProducer {
    async fn produce(&self, _difficulty: Difficulty) -> Result<Quiz, GenerationError> {
      panic!("producer blew up");
    }
  }

  #[test]
  fn match_score_bounds() {
    let a = tags(&["EC2", "ALB"]);
    assert_eq!(match_score(&a, &a), 100);
    assert_eq!(match_score(&a, &[]), 0);
    assert_eq!(match_score(&[], &a), 0);
    assert_eq!(match_score(&a, &tags(&["aurora"])), 0);
    assert_eq!(match_score(&a, &tags(&["ec2", "alb"])), 100);
    // one of two quiz tags, one of one requested tag: 0.6*0.5 + 0.4*1.0
    assert_eq!(match_score(&a, &tags(&["EC2"])), 70);
  }

  #[tokio::test]
  async fn best_infra_match_is_served_first() {
    let pool = memory_pool();
    let matching = seed(Difficulty::Easy, &["EC2", "ALB"]);
    let other = seed(Difficulty::Easy, &["Aurora"]);
    let matching_id = matching.id;
    assert!(pool.put(matching).await);
    assert!(pool.put(other).await);

    let got = pool.get(Difficulty::Easy, &tags(&["EC2", "ALB"])).await.unwrap();
    assert_eq!(got.id, matching_id);
  }

  #[tokio::test]
  async fn entries_are_single_use() {
    let pool = memory_pool();
    for _ in 0..3 {
      assert!(pool.put(seed(Difficulty::Medium, &["RDS"])).await);
    }
    let mut seen = HashSet::new();
    for remaining in (0..3).rev() {
      let quiz = pool.get(Difficulty::Medium, &tags(&["RDS"])).await.unwrap();
      assert!(seen.insert(quiz.id));
      assert_eq!(pool.stats().await.pool_sizes.medium, remaining);
    }
    assert!(pool.get(Difficulty::Medium, &[]).await.is_none());

    let stats = pool.stats().await;
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 75.0);
  }

  #[tokio::test]
  async fn put_skips_low_quality_and_invalid() {
    let pool = memory_pool();
    let mut low = seed(Difficulty::Hard, &["EKS"]);
    low.quality_score = Some(40);
    assert!(!pool.put(low).await);

    let mut broken = seed(Difficulty::Hard, &["EKS"]);
    broken.question = "짧음?".into();
    assert!(!pool.put(broken).await);
    assert_eq!(pool.stats().await.total_cached, 0);
  }

  #[tokio::test]
  async fn pool_is_capped_at_target_size() {
    let settings = PoolSettings { pool_size: 2, ..PoolSettings::default() };
    let pool = CachePool::new(Arc::new(MemoryStore::new()), settings);
    for _ in 0..4 {
      assert!(pool.put(seed(Difficulty::Easy, &["EC2"])).await);
    }
    assert_eq!(pool.stats().await.pool_sizes.easy, 2);
  }

  #[tokio::test]
  async fn corrupt_entries_fall_back_to_oldest_pop() {
    let store = Arc::new(MemoryStore::new());
    let pool = CachePool::new(store.clone(), PoolSettings::default());
    assert!(pool.put(seed(Difficulty::Easy, &["EC2"])).await);
    store.lpush("quiz:pool:EASY", "not json".into()).await.unwrap();

    // The scan trips over the corrupt head entry; the oldest (valid) one is popped.
    let got = pool.get(Difficulty::Easy, &tags(&["EC2"])).await;
    assert!(got.is_some());
  }

  #[tokio::test]
  async fn corrupt_oldest_entries_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let pool = CachePool::new(store.clone(), PoolSettings::default());
    store.lpush("quiz:pool:EASY", "not json".into()).await.unwrap();
    store.lpush("quiz:pool:EASY", "{\"also\": \"broken\"}".into()).await.unwrap();
    let valid = seed(Difficulty::Easy, &["EC2"]);
    let valid_id = valid.id;
    assert!(pool.put(valid).await);

    // Scan trips on the broken entries; pops skip both of them.
    let got = pool.get(Difficulty::Easy, &tags(&["EC2"])).await.unwrap();
    assert_eq!(got.id, valid_id);
    assert_eq!(pool.stats().await.hits, 1);
  }

  #[tokio::test]
  async fn lost_removal_rescans_for_another_entry() {
    let store = Arc::new(StealingStore { inner: MemoryStore::new(), stolen: AtomicUsize::new(0) });
    let pool = CachePool::new(store.clone(), PoolSettings::default());
    let best = seed(Difficulty::Easy, &["EC2", "ALB"]);
    let other = seed(Difficulty::Easy, &["S3"]);
    let (best_id, other_id) = (best.id, other.id);
    assert!(pool.put(other).await);
    assert!(pool.put(best).await);

    let got = pool.get(Difficulty::Easy, &tags(&["EC2", "ALB"])).await.unwrap();
    assert_ne!(got.id, best_id, "the stolen entry must not be served twice");
    assert_eq!(got.id, other_id);
    assert_eq!(store.stolen.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().await.pool_sizes.easy, 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn parallel_readers_never_share_an_entry() {
    const READERS: usize = 8;
    let pool = Arc::new(memory_pool());
    for _ in 0..READERS {
      assert!(pool.put(seed(Difficulty::Hard, &["EKS"])).await);
    }
    assert_eq!(pool.stats().await.pool_sizes.hard, READERS);

    let mut readers = JoinSet::new();
    for _ in 0..READERS {
      let pool = pool.clone();
      readers.spawn(async move { pool.get(Difficulty::Hard, &tags(&["EKS"])).await });
    }
    let mut ids = HashSet::new();
    while let Some(res) = readers.join_next().await {
      let quiz = res.unwrap().expect("every reader gets a quiz");
      assert!(ids.insert(quiz.id), "quiz {} served twice", quiz.id);
    }

    let stats = pool.stats().await;
    assert_eq!(ids.len(), READERS);
    assert_eq!(stats.pool_sizes.hard, 0);
    assert_eq!(stats.hits, READERS as u64);
    assert_eq!(stats.misses, 0);
  }

  #[tokio::test]
  async fn panicking_refill_releases_its_slot() {
    let (pool, rx) = CachePool::with_refill(Arc::new(MemoryStore::new()), PoolSettings::default());
    let pool = Arc::new(pool);
    let producer: Arc<dyn QuizProducer> = Arc::new(PanickingProducer);
    let _worker = spawn_refill_worker(&pool, &producer, rx);

    pool.preload(Difficulty::Medium, 2);
    assert!(pool.in_flight[Difficulty::Medium.index()].load(Ordering::Acquire));
    for _ in 0..100 {
      if !pool.in_flight[Difficulty::Medium.index()].load(Ordering::Acquire) {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!pool.in_flight[Difficulty::Medium.index()].load(Ordering::Acquire));
  }

  #[tokio::test]
  async fn store_failures_are_misses() {
    let pool = CachePool::new(Arc::new(BrokenStore), PoolSettings::default());
    assert!(pool.get(Difficulty::Easy, &tags(&["EC2"])).await.is_none());
    assert!(!pool.put(seed(Difficulty::Easy, &["EC2"])).await);
    let stats = pool.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total_cached, 0);
    assert_eq!(stats.last_refresh, None);
  }

  #[tokio::test]
  async fn preload_requests_are_coalesced() {
    let (pool, mut rx) = CachePool::with_refill(Arc::new(MemoryStore::new()), PoolSettings::default());
    pool.preload(Difficulty::Easy, 4);
    pool.preload(Difficulty::Easy, 2);
    pool.preload(Difficulty::Hard, 1);
    assert_eq!(rx.try_recv().unwrap(), RefillRequest { difficulty: Difficulty::Easy, count: 4 });
    assert_eq!(rx.try_recv().unwrap(), RefillRequest { difficulty: Difficulty::Hard, count: 1 });
    assert!(rx.try_recv().is_err());

    pool.finish_refill(Difficulty::Easy);
    pool.preload(Difficulty::Easy, 3);
    assert_eq!(rx.try_recv().unwrap().count, 3);
  }

  #[tokio::test]
  async fn worker_refills_in_background() {
    let (pool, rx) = CachePool::with_refill(Arc::new(MemoryStore::new()), PoolSettings::default());
    let pool = Arc::new(pool);
    let seeder = Arc::new(SeedProducer { calls: AtomicUsize::new(0) });
    let producer: Arc<dyn QuizProducer> = seeder.clone();
    let _worker = spawn_refill_worker(&pool, &producer, rx);

    // Empty pool: miss, then a refill for the full target size.
    assert!(pool.get(Difficulty::Easy, &[]).await.is_none());
    for _ in 0..100 {
      let stats = pool.stats().await;
      if stats.pool_sizes.easy == 10 && stats.last_refresh.is_some() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stats = pool.stats().await;
    assert_eq!(stats.pool_sizes.easy, 10);
    assert!(stats.last_refresh.is_some());
    assert_eq!(seeder.calls.load(Ordering::SeqCst), 10);
  }
}
