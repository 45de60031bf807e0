//! [`LearningEngine`]: one handle over a store and both configurations.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Duration, Utc};
use ratchet_core::{
  config::{LearningConfig, PropagationConfig},
  execution::Params,
  store::LearningStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  miner::PatternMiner,
  promoter::PatternPromoter,
  propagation::{CycleReport, PropagationCycle},
  rulebook::RuleBook,
  runner::{ArtifactOutcome, ToolInvoker, run_artifact},
  tracker::RuleTracker,
};

/// Lease name guarding mining passes.
pub const MINING_LEASE: &str = "mining";
/// Lease name guarding propagation cycles.
pub const PROPAGATION_LEASE: &str = "propagation";

/// Outcome of one [`LearningEngine::mine_once`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiningReport {
  pub window_start:       DateTime<Utc>,
  pub executions_scanned: usize,
  pub candidates:         usize,
  pub inserted:           usize,
  pub updated:            usize,
  pub failed:             usize,
  pub generated:          Vec<Uuid>,
  pub duration_ms:        u64,
}

pub struct LearningEngine<S> {
  store:       Arc<S>,
  learning:    LearningConfig,
  propagation: PropagationConfig,
  lease_ttl:   Duration,
}

impl<S: LearningStore> LearningEngine<S> {
  pub fn new(store: Arc<S>, learning: LearningConfig, propagation: PropagationConfig) -> Self {
    Self {
      store,
      learning,
      propagation,
      lease_ttl: Duration::minutes(30),
    }
  }

  /// How long a lease taken by this engine stays valid if never released.
  pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
    self.lease_ttl = ttl;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn propagation_config(&self) -> &PropagationConfig { &self.propagation }

  pub fn rules(&self) -> RuleBook<'_, S> { RuleBook::new(&*self.store) }

  pub fn tracker(&self) -> RuleTracker<'_, S> { RuleTracker::new(&*self.store, &self.propagation) }

  // ─── Mining ────────────────────────────────────────────────────────────────

  /// Mine the lookback window ending at `now` and merge what was found.
  pub async fn mine_once(&self, now: DateTime<Utc>) -> Result<MiningReport> {
    let started = Instant::now();
    let window_start = now - self.learning.lookback();
    let executions = self
      .store
      .successful_executions_since(window_start, self.learning.max_executions)
      .await
      .map_err(Error::store)?;

    let candidates = PatternMiner::new(&self.learning).detect(&executions);
    let summary = PatternPromoter::new(&*self.store, &self.learning)
      .apply(&candidates)
      .await;

    let report = MiningReport {
      window_start,
      executions_scanned: executions.len(),
      candidates: candidates.len(),
      inserted: summary.inserted,
      updated: summary.updated,
      failed: summary.failed,
      generated: summary.generated,
      duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    tracing::info!(
      executions = report.executions_scanned,
      candidates = report.candidates,
      inserted = report.inserted,
      updated = report.updated,
      generated = report.generated.len(),
      failed = report.failed,
      "mining pass completed"
    );
    Ok(report)
  }

  /// [`Self::mine_once`] under the mining lease. `None` if another holder
  /// has it.
  pub async fn mine_exclusive(&self, now: DateTime<Utc>) -> Result<Option<MiningReport>> {
    let Some(holder) = self.acquire(MINING_LEASE).await? else {
      return Ok(None);
    };
    let result = self.mine_once(now).await;
    self.release(MINING_LEASE, &holder).await;
    result.map(Some)
  }

  // ─── Propagation ───────────────────────────────────────────────────────────

  pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
    PropagationCycle::new(&*self.store, &self.propagation).run(now).await
  }

  /// [`Self::run_cycle`] under the propagation lease. `None` if another
  /// holder has it.
  pub async fn cycle_exclusive(&self, now: DateTime<Utc>) -> Result<Option<CycleReport>> {
    let Some(holder) = self.acquire(PROPAGATION_LEASE).await? else {
      return Ok(None);
    };
    let result = self.run_cycle(now).await;
    self.release(PROPAGATION_LEASE, &holder).await;
    result.map(Some)
  }

  // ─── Artifacts ─────────────────────────────────────────────────────────────

  /// Run a stored artifact through `invoker` and record its usage.
  pub async fn run_artifact<I: ToolInvoker>(
    &self,
    id: Uuid,
    overrides: &Params,
    invoker: &I,
  ) -> Result<ArtifactOutcome> {
    let artifact = self
      .store
      .get_artifact(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ArtifactNotFound(id))?;
    if !artifact.is_active {
      return Err(Error::ArtifactInactive(id));
    }

    let outcome = run_artifact(&artifact.template, overrides, invoker).await;
    self
      .store
      .record_artifact_usage(id, outcome.success, Utc::now())
      .await
      .map_err(Error::store)?;
    Ok(outcome)
  }

  // ─── Leases ────────────────────────────────────────────────────────────────

  /// Take `name` under a fresh holder token, one per run, so two runs
  /// sharing this engine exclude each other.
  async fn acquire(&self, name: &str) -> Result<Option<String>> {
    let holder = format!("run-{}", Uuid::new_v4().simple());
    let acquired = self
      .store
      .try_acquire_lease(name, &holder, self.lease_ttl)
      .await
      .map_err(Error::store)?;
    if !acquired {
      tracing::debug!(lease = name, "lease held elsewhere; skipping run");
      return Ok(None);
    }
    Ok(Some(holder))
  }

  async fn release(&self, name: &str, holder: &str) {
    if let Err(e) = self.store.release_lease(name, holder).await {
      tracing::warn!(lease = name, error = %e, "failed to release lease");
    }
  }
}
