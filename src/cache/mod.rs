//! Quiz pool backed by a shared list store.

pub mod pool;
pub mod store;

pub use pool::{match_score, spawn_refill_worker, CachePool, CacheStats, PoolSettings, QuizProducer, RefillRequest};
pub use store::{CacheStore, MemoryStore};
