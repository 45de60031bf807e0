//! The recurring runner: timed mining and propagation, plus mining on
//! execution volume.
//!
//! Every run goes through the engine's lease-guarded entry points, so a
//! second server pointed at the same store skips rather than races.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ratchet_api::MiningTrigger;
use ratchet_core::store::LearningStore;
use ratchet_engine::LearningEngine;
use tokio::{
  task::JoinHandle,
  time::{Interval, MissedTickBehavior},
};

pub struct Scheduler<S> {
  engine:      Arc<LearningEngine<S>>,
  mining:      Option<Duration>,
  propagation: Option<Duration>,
  trigger:     Option<Arc<MiningTrigger>>,
}

impl<S: LearningStore + 'static> Scheduler<S> {
  pub fn new(engine: Arc<LearningEngine<S>>) -> Self {
    Self { engine, mining: None, propagation: None, trigger: None }
  }

  pub fn mining_every(mut self, every: Option<Duration>) -> Self {
    self.mining = every;
    self
  }

  pub fn propagation_every(mut self, every: Option<Duration>) -> Self {
    self.propagation = every;
    self
  }

  pub fn on_volume(mut self, trigger: Arc<MiningTrigger>) -> Self {
    self.trigger = Some(trigger);
    self
  }

  pub fn spawn(self) -> JoinHandle<()> { tokio::spawn(self.run()) }

  /// Loop forever. Timers start one period from now.
  pub async fn run(self) {
    let mut mining = self.mining.map(delayed_interval);
    let mut propagation = self.propagation.map(delayed_interval);
    tracing::info!(
      mining = ?self.mining,
      propagation = ?self.propagation,
      on_volume = self.trigger.is_some(),
      "scheduler started"
    );

    loop {
      tokio::select! {
        _ = tick(&mut mining) => self.mine("interval").await,
        _ = tick(&mut propagation) => self.cycle().await,
        _ = notified(self.trigger.as_deref()) => self.mine("volume").await,
      }
    }
  }

  async fn mine(&self, reason: &'static str) {
    match self.engine.mine_exclusive(Utc::now()).await {
      Ok(Some(report)) => tracing::info!(
        reason,
        executions = report.executions_scanned,
        generated = report.generated.len(),
        "scheduled mining pass finished"
      ),
      Ok(None) => tracing::debug!(reason, "mining already running elsewhere"),
      Err(e) => tracing::error!(reason, error = %e, "scheduled mining pass failed"),
    }
  }

  async fn cycle(&self) {
    match self.engine.cycle_exclusive(Utc::now()).await {
      Ok(Some(report)) => tracing::info!(
        promoted = report.promoted.len(),
        deactivated = report.deactivated.len(),
        "scheduled propagation cycle finished"
      ),
      Ok(None) => tracing::debug!("propagation already running elsewhere"),
      Err(e) => tracing::error!(error = %e, "scheduled propagation cycle failed"),
    }
  }
}

fn delayed_interval(period: Duration) -> Interval {
  let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
  interval
}

/// Never completes for a disabled timer.
async fn tick(interval: &mut Option<Interval>) {
  match interval {
    Some(interval) => {
      interval.tick().await;
    }
    None => std::future::pending().await,
  }
}

async fn notified(trigger: Option<&MiningTrigger>) {
  match trigger {
    Some(trigger) => trigger.notified().await,
    None => std::future::pending().await,
  }
}
