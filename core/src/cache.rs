// core/src/cache.rs

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Memoises lookups for a bounded time. One instance per checkout; never shared globally.
#[derive(Debug)]
pub struct TtlCache<K, V> {
  entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  pub fn get(&self, key: &K) -> Option<V> {
    let mut entries = self.entries.lock();
    match entries.get(key) {
      Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
      Some(_) => {
        entries.remove(key);
        None
      }
      None => None,
    }
  }

  pub fn set(&self, key: K, value: V, ttl: Duration) {
    self.entries.lock().insert(key, (value, Instant::now() + ttl));
  }

  pub fn invalidate(&self, key: &K) {
    self.entries.lock().remove(key);
  }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
  fn default() -> Self {
    Self::new()
  }
}
