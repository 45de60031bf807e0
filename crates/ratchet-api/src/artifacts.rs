//! Handlers for `/artifacts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/artifacts` | `?active_only=true` hides deactivated artifacts |
//! | `GET`  | `/artifacts/:id` | Single artifact, active or not |
//! | `POST` | `/artifacts/:id/deactivate` | Returns the artifact; idempotent |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ratchet_core::{artifact::GeneratedTool, store::LearningStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /artifacts[?active_only=true]`
pub async fn list<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<GeneratedTool>>, ApiError> {
  let artifacts = state
    .engine
    .store()
    .list_artifacts(params.active_only)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(artifacts))
}

/// `GET /artifacts/:id`
pub async fn get_one<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<GeneratedTool>, ApiError> {
  Ok(Json(fetch(&state, id).await?))
}

/// `POST /artifacts/:id/deactivate`
///
/// The source pattern keeps its back-reference, so the artifact is never
/// regenerated.
pub async fn deactivate<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<GeneratedTool>, ApiError> {
  let was_active = state
    .engine
    .store()
    .deactivate_artifact(id)
    .await
    .map_err(ApiError::store)?;
  let artifact = fetch(&state, id).await?;
  if was_active {
    tracing::info!(tool = %artifact.tool_name, "deactivated artifact");
  }
  Ok(Json(artifact))
}

async fn fetch<S: LearningStore>(state: &ApiState<S>, id: Uuid) -> Result<GeneratedTool, ApiError> {
  state
    .engine
    .store()
    .get_artifact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("artifact {id} not found")))
}
