//! Handler for `GET /knowledge`, the audit trail.

use axum::{
  Json,
  extract::{Query, State},
};
use ratchet_core::{
  knowledge::{EntryType, KnowledgeEntry},
  store::LearningStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub entry_type: Option<EntryType>,
  pub limit:      Option<usize>,
}

/// `GET /knowledge[?entry_type=...][&limit=...]`, newest first.
pub async fn list<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<KnowledgeEntry>>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let entries = state
    .engine
    .store()
    .list_knowledge(params.entry_type, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
