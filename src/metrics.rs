//! Process-lifetime generation counters.
//!
//! Counters are plain atomics so concurrent `generate` calls and background
//! refills never lose updates. Averages are derived from running sums at
//! snapshot time.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct GenerationMetrics {
  total_generated: AtomicU64,
  successful: AtomicU64,
  failed: AtomicU64,
  attempts: AtomicU64,
  llm_failures: AtomicU64,
  parse_failures: AtomicU64,
  validation_failures: AtomicU64,
  quality_failures: AtomicU64,
  fallback_used: AtomicU64,
  latency_ms_sum: AtomicU64,
  quality_sum: AtomicU64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
  pub total_generated: u64,
  pub successful: u64,
  pub failed: u64,
  pub attempts: u64,
  pub llm_failures: u64,
  pub parse_failures: u64,
  pub validation_failures: u64,
  pub quality_failures: u64,
  pub fallback_used: u64,
  pub avg_generation_time_ms: f64,
  pub avg_quality_score: f64,
}

impl GenerationMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// One `generate` call (or background refill run) started.
  pub fn record_request(&self) {
    self.total_generated.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_attempt(&self) {
    self.attempts.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_llm_failure(&self) {
    self.llm_failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_parse_failure(&self) {
    self.parse_failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_validation_failure(&self) {
    self.validation_failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_quality_failure(&self) {
    self.quality_failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_fallback(&self) {
    self.fallback_used.fetch_add(1, Ordering::Relaxed);
  }

  /// A candidate cleared every gate.
  pub fn record_success(&self, elapsed_ms: u64, quality: u32) {
    self.successful.fetch_add(1, Ordering::Relaxed);
    self.latency_ms_sum.fetch_add(elapsed_ms, Ordering::Relaxed);
    self.quality_sum.fetch_add(quality as u64, Ordering::Relaxed);
  }

  /// Every attempt failed, whether or not a fallback was served afterwards.
  pub fn record_failure(&self) {
    self.failed.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    let successful = self.successful.load(Ordering::Relaxed);
    let avg = |sum: &AtomicU64| {
      if successful == 0 {
        0.0
      } else {
        sum.load(Ordering::Relaxed) as f64 / successful as f64
      }
    };
    MetricsSnapshot {
      total_generated: self.total_generated.load(Ordering::Relaxed),
      successful,
      failed: self.failed.load(Ordering::Relaxed),
      attempts: self.attempts.load(Ordering::Relaxed),
      llm_failures: self.llm_failures.load(Ordering::Relaxed),
      parse_failures: self.parse_failures.load(Ordering::Relaxed),
      validation_failures: self.validation_failures.load(Ordering::Relaxed),
      quality_failures: self.quality_failures.load(Ordering::Relaxed),
      fallback_used: self.fallback_used.load(Ordering::Relaxed),
      avg_generation_time_ms: avg(&self.latency_ms_sum),
      avg_quality_score: avg(&self.quality_sum),
    }
  }

  /// Operator reset; the only way counters go back to zero.
  pub fn reset(&self) {
    for c in [
      &self.total_generated,
      &self.successful,
      &self.failed,
      &self.attempts,
      &self.llm_failures,
      &self.parse_failures,
      &self.validation_failures,
      &self.quality_failures,
      &self.fallback_used,
      &self.latency_ms_sum,
      &self.quality_sum,
    ] {
      c.store(0, Ordering::Relaxed);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn averages_are_over_successes() {
    let m = GenerationMetrics::new();
    m.record_success(100, 70);
    m.record_success(300, 90);
    m.record_failure();
    let s = m.snapshot();
    assert_eq!(s.successful, 2);
    assert_eq!(s.avg_generation_time_ms, 200.0);
    assert_eq!(s.avg_quality_score, 80.0);
  }

  #[test]
  fn reset_zeroes_everything() {
    let m = GenerationMetrics::new();
    m.record_request();
    m.record_llm_failure();
    m.record_fallback();
    m.reset();
    let s = m.snapshot();
    assert_eq!(s.total_generated, 0);
    assert_eq!(s.llm_failures, 0);
    assert_eq!(s.fallback_used, 0);
    assert_eq!(s.avg_quality_score, 0.0);
  }
}
