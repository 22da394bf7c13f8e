// core/src/payment/guard.rs

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
  AlreadyProcessed(String),
  /// Another transaction is being finalized right now.
  InFlight { current: String },
}

#[derive(Debug, Default)]
struct GuardState {
  processed: HashSet<String>,
  in_flight: Option<String>,
}

/// Lets exactly one finalization attempt through per transaction id, and one at a time overall.
///
/// Owned by the orchestrator and passed explicitly; completion signals can race each other
/// (duplicate provider callbacks), so this lives outside any render/UI state.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
  state: Mutex<GuardState>,
}

impl IdempotencyGuard {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn try_acquire(self: &Arc<Self>, trans_id: &str) -> Result<FinalizationPermit, GuardRejection> {
    let mut state = self.state.lock();
    if state.processed.contains(trans_id) {
      debug!(%trans_id, "Duplicate completion signal ignored.");
      return Err(GuardRejection::AlreadyProcessed(trans_id.to_string()));
    }
    if let Some(current) = &state.in_flight {
      debug!(%trans_id, %current, "Completion signal ignored while another is in flight.");
      return Err(GuardRejection::InFlight {
        current: current.clone(),
      });
    }
    state.processed.insert(trans_id.to_string());
    state.in_flight = Some(trans_id.to_string());
    Ok(FinalizationPermit {
      guard: Arc::clone(self),
      trans_id: trans_id.to_string(),
    })
  }

  pub fn is_processed(&self, trans_id: &str) -> bool {
    self.state.lock().processed.contains(trans_id)
  }

  pub fn is_busy(&self) -> bool {
    self.state.lock().in_flight.is_some()
  }
}

/// Held for the duration of one finalization. Dropping it clears the in-flight flag; the
/// transaction stays recorded as processed.
#[derive(Debug)]
pub struct FinalizationPermit {
  guard: Arc<IdempotencyGuard>,
  trans_id: String,
}

impl FinalizationPermit {
  pub fn trans_id(&self) -> &str {
    &self.trans_id
  }
}

impl Drop for FinalizationPermit {
  fn drop(&mut self) {
    let mut state = self.guard.state.lock();
    if state.in_flight.as_deref() == Some(self.trans_id.as_str()) {
      state.in_flight = None;
    }
  }
}
