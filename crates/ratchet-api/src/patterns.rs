//! Handlers for `/patterns` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ratchet_core::{
  pattern::{LearnedPattern, PatternKind},
  store::LearningStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// `sequence` or `parameter`; both when absent.
  pub kind: Option<PatternKind>,
}

/// `GET /patterns[?kind=...]`
pub async fn list<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<LearnedPattern>>, ApiError> {
  let patterns = state
    .engine
    .store()
    .list_patterns(params.kind)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(patterns))
}

/// `GET /patterns/:signature`. The signature must be percent-encoded.
pub async fn get_one<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(signature): Path<String>,
) -> Result<Json<LearnedPattern>, ApiError> {
  let pattern = state
    .engine
    .store()
    .get_pattern(&signature)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("pattern {signature:?} not found")))?;
  Ok(Json(pattern))
}
