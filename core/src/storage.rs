// core/src/storage.rs

//! Client-side persisted state (the browser's local/session storage in the storefront).

use crate::error::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const CHECKOUT_CART_KEY: &str = "checkoutCart";
pub const PENDING_ORDER_KEY: &str = "pendingOrder";
pub const COMPLETED_ORDER_KEY: &str = "completedOrder";
pub const SELECTED_TRACKS_KEY: &str = "selectedTracks";
const SELECTED_ADD_ONS_PREFIX: &str = "selectedAddOns";

/// Add-on selections are scoped to one checkout session.
pub fn add_ons_key(session_id: &str) -> String {
  format!("{}:{}", SELECTED_ADD_ONS_PREFIX, session_id)
}

/// String key-value storage that outlives a page render.
pub trait ClientStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: String);
  fn remove(&self, key: &str);
  fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
  entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ClientStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.read().get(key).cloned()
  }

  fn set(&self, key: &str, value: String) {
    self.entries.write().insert(key.to_string(), value);
  }

  fn remove(&self, key: &str) {
    self.entries.write().remove(key);
  }

  fn keys(&self) -> Vec<String> {
    self.entries.read().keys().cloned().collect()
  }
}

pub fn save_json<T: Serialize>(store: &dyn ClientStore, key: &str, value: &T) -> Result<()> {
  store.set(key, serde_json::to_string(value)?);
  Ok(())
}

/// Reads a JSON value. A corrupt entry is dropped and reported as absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn ClientStore, key: &str) -> Option<T> {
  let raw = store.get(key)?;
  match serde_json::from_str(&raw) {
    Ok(value) => Some(value),
    Err(e) => {
      tracing::warn!(%key, error = %e, "Discarding unreadable stored value.");
      store.remove(key);
      None
    }
  }
}

/// Wipes everything tied to an in-progress or just-finished checkout. Called on logout and after
/// an order completes (the completed-order snapshot is kept for the confirmation page).
pub fn clear_checkout_state(store: &dyn ClientStore, keep_completed_order: bool) {
  for key in [CHECKOUT_CART_KEY, PENDING_ORDER_KEY, SELECTED_TRACKS_KEY] {
    store.remove(key);
  }
  if !keep_completed_order {
    store.remove(COMPLETED_ORDER_KEY);
  }
  for key in store.keys() {
    if key.starts_with(SELECTED_ADD_ONS_PREFIX) {
      store.remove(&key);
    }
  }
}
