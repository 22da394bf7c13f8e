// core/src/fencing.rs

//! Last-write-wins helpers for requests and timers that can be superseded by newer input.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Issued by [`RequestFence::begin`]; only the most recent ticket is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceTicket(u64);

/// Discards responses that resolve after a newer request was started.
#[derive(Debug, Default)]
pub struct RequestFence {
  generation: AtomicU64,
}

impl RequestFence {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin(&self) -> FenceTicket {
    FenceTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
  }

  pub fn is_current(&self, ticket: FenceTicket) -> bool {
    self.generation.load(Ordering::SeqCst) == ticket.0
  }

  /// Makes every outstanding ticket stale.
  pub fn invalidate(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
  }
}

/// Runs the latest scheduled job after a quiet period. Scheduling again aborts the pending job.
#[derive(Debug, Default)]
pub struct Debouncer {
  delay: Duration,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: Mutex::new(None),
    }
  }

  pub fn schedule<F>(&self, job: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let delay = self.delay;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      job.await;
    });
    if let Some(previous) = self.pending.lock().replace(handle) {
      previous.abort();
    }
  }

  pub fn cancel(&self) {
    if let Some(pending) = self.pending.lock().take() {
      pending.abort();
    }
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}

/// Background tasks owned by one checkout; all of them are aborted on teardown.
#[derive(Debug, Default, Clone)]
pub struct TaskSet {
  handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
  pub fn spawn<F>(&self, fut: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let mut handles = self.handles.lock();
    handles.retain(|h| !h.is_finished());
    handles.push(tokio::spawn(fut));
  }

  pub fn len(&self) -> usize {
    self.handles.lock().iter().filter(|h| !h.is_finished()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn abort_all(&self) {
    for handle in self.handles.lock().drain(..) {
      handle.abort();
    }
  }
}
