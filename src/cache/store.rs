//! Shared key-value store behind the quiz pool.
//!
//! The pool only needs a handful of list and counter operations, each of which
//! must be atomic on its own. `MemoryStore` is the in-process implementation;
//! a networked store plugs in by implementing `CacheStore`.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;

/// List and counter primitives with Redis semantics (inclusive ranges,
/// negative indices count from the tail).
#[async_trait]
pub trait CacheStore: Send + Sync {
  /// Push to the head; returns the new length.
  async fn lpush(&self, key: &str, value: String) -> Result<usize, CacheError>;
  /// Keep only `start..=stop`.
  async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), CacheError>;
  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, CacheError>;
  /// Remove up to `count` occurrences of `value` from the head; returns how many went.
  async fn lrem(&self, key: &str, count: usize, value: &str) -> Result<usize, CacheError>;
  /// Pop from the tail (oldest entry).
  async fn rpop(&self, key: &str) -> Result<Option<String>, CacheError>;
  async fn llen(&self, key: &str) -> Result<usize, CacheError>;
  async fn incr(&self, key: &str) -> Result<u64, CacheError>;
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
  async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
  async fn del(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct MemoryStore {
  lists: RwLock<HashMap<String, VecDeque<String>>>,
  values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

// Resolve a Redis-style inclusive range against `len`.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
  if len == 0 {
    return None;
  }
  let len_i = len as isize;
  let norm = |i: isize| if i < 0 { len_i + i } else { i };
  let start = norm(start).max(0);
  let stop = norm(stop).min(len_i - 1);
  if start > stop || start >= len_i {
    return None;
  }
  Some((start as usize, stop as usize))
}

#[async_trait]
impl CacheStore for MemoryStore {
  async fn lpush(&self, key: &str, value: String) -> Result<usize, CacheError> {
    let mut lists = self.lists.write().await;
    let list = lists.entry(key.to_string()).or_default();
    list.push_front(value);
    Ok(list.len())
  }

  async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), CacheError> {
    let mut lists = self.lists.write().await;
    let Some(list) = lists.get_mut(key) else {
      return Ok(());
    };
    match resolve_range(list.len(), start, stop) {
      Some((s, e)) => {
        list.truncate(e + 1);
        list.drain(..s);
      }
      None => list.clear(),
    }
    if list.is_empty() {
      lists.remove(key);
    }
    Ok(())
  }

  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, CacheError> {
    let lists = self.lists.read().await;
    let Some(list) = lists.get(key) else {
      return Ok(Vec::new());
    };
    Ok(match resolve_range(list.len(), start, stop) {
      Some((s, e)) => list.range(s..=e).cloned().collect(),
      None => Vec::new(),
    })
  }

  async fn lrem(&self, key: &str, count: usize, value: &str) -> Result<usize, CacheError> {
    let mut lists = self.lists.write().await;
    let Some(list) = lists.get_mut(key) else {
      return Ok(0);
    };
    let mut removed = 0;
    let limit = if count == 0 { usize::MAX } else { count };
    list.retain(|v| {
      if removed < limit && v == value {
        removed += 1;
        false
      } else {
        true
      }
    });
    if list.is_empty() {
      lists.remove(key);
    }
    Ok(removed)
  }

  async fn rpop(&self, key: &str) -> Result<Option<String>, CacheError> {
    let mut lists = self.lists.write().await;
    let Some(list) = lists.get_mut(key) else {
      return Ok(None);
    };
    let out = list.pop_back();
    if list.is_empty() {
      lists.remove(key);
    }
    Ok(out)
  }

  async fn llen(&self, key: &str) -> Result<usize, CacheError> {
    Ok(self.lists.read().await.get(key).map_or(0, VecDeque::len))
  }

  async fn incr(&self, key: &str) -> Result<u64, CacheError> {
    let mut values = self.values.write().await;
    let current = match values.get(key) {
      Some(v) => v
        .parse::<u64>()
        .map_err(|_| CacheError::Store(format!("value at '{key}' is not an integer")))?,
      None => 0,
    };
    let next = current + 1;
    values.insert(key.to_string(), next.to_string());
    Ok(next)
  }

  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
    Ok(self.values.read().await.get(key).cloned())
  }

  async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
    self.values.write().await.insert(key.to_string(), value);
    Ok(())
  }

  async fn del(&self, key: &str) -> Result<(), CacheError> {
    self.lists.write().await.remove(key);
    self.values.write().await.remove(key);
    Ok(())
  }
}
