//! On-demand mining passes and propagation cycles.
//!
//! Both run under the same leases as the scheduler; a run already in
//! progress elsewhere yields 409 rather than a second, racing run.

use axum::{Json, extract::State};
use chrono::Utc;
use ratchet_core::store::LearningStore;
use ratchet_engine::{CycleReport, MiningReport};

use crate::{ApiState, error::ApiError};

/// `POST /mining/run`
pub async fn mine<S: LearningStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<MiningReport>, ApiError> {
  state
    .engine
    .mine_exclusive(Utc::now())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::Conflict("a mining pass is already running".into()))
}

/// `POST /propagation/run`
pub async fn propagate<S: LearningStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<CycleReport>, ApiError> {
  state
    .engine
    .cycle_exclusive(Utc::now())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::Conflict("a propagation cycle is already running".into()))
}
