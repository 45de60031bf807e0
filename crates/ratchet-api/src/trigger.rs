//! Wakes the miner after every N completed executions.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

pub struct MiningTrigger {
  every:     u64,
  completed: AtomicU64,
  notify:    Notify,
}

impl MiningTrigger {
  /// `every == 0` disables the trigger.
  pub fn new(every: u64) -> Self {
    Self { every, completed: AtomicU64::new(0), notify: Notify::new() }
  }

  /// Count one completed execution. Returns whether this completion woke the
  /// miner.
  pub fn record_completion(&self) -> bool {
    if self.every == 0 {
      return false;
    }
    let n = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
    if n % self.every != 0 {
      return false;
    }
    self.notify.notify_one();
    true
  }

  /// Completes once the threshold has been crossed since the last wake-up.
  /// A crossing with nobody waiting is remembered.
  pub async fn notified(&self) { self.notify.notified().await }

  pub fn completed(&self) -> u64 { self.completed.load(Ordering::Relaxed) }
}
