//! Handlers for `/executions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/executions` | Body: [`NewToolExecution`]; returns 201 + the running execution |
//! | `POST` | `/executions/:id/complete` | Body: [`ExecutionOutcome`]; 409 if already completed |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ratchet_core::{
  execution::{ExecutionOutcome, NewToolExecution, ToolExecution},
  store::LearningStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// `POST /executions`
pub async fn start<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewToolExecution>,
) -> Result<impl IntoResponse, ApiError> {
  if body.tool_name.trim().is_empty() {
    return Err(ApiError::BadRequest("tool_name must not be empty".into()));
  }
  let execution = state
    .engine
    .store()
    .record_execution(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(execution)))
}

/// `POST /executions/:id/complete`
pub async fn complete<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(outcome): Json<ExecutionOutcome>,
) -> Result<Json<ToolExecution>, ApiError> {
  let store = state.engine.store();
  let existing = store
    .get_execution(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("execution {id} not found")))?;
  if existing.is_completed() {
    return Err(ApiError::Conflict(format!("execution {id} is already completed")));
  }

  let execution = store
    .complete_execution(id, outcome)
    .await
    .map_err(ApiError::store)?;
  if let Some(trigger) = &state.trigger
    && trigger.record_completion()
  {
    tracing::debug!(completed = trigger.completed(), "execution volume reached; waking miner");
  }
  Ok(Json(execution))
}
