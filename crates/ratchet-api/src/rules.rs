//! Handlers for `/rules` and `/applications` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/rules` | `?scopes=a,b&technology=...&client=...&project=...` |
//! | `POST` | `/rules` | Body: [`NewValidationRule`]; returns 201 + stored rule |
//! | `GET`  | `/rules/:id` | Single rule, active or not |
//! | `GET`  | `/rules/:id/applications` | Full application history, oldest first |
//! | `POST` | `/applications` | Body: [`NewRuleApplication`]; returns 201 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use ratchet_core::{
  Scope,
  rule::{NewRuleApplication, NewValidationRule, RuleApplication, RuleQuery, ValidationRule},
  store::LearningStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

// ─── Read contract ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Comma-separated scopes, e.g. `project,global`. All when absent.
  pub scopes:     Option<String>,
  pub technology: Option<String>,
  /// Identity of the asking client.
  pub client:     Option<String>,
  /// Path of the asking project.
  pub project:    Option<String>,
}

impl ListParams {
  fn into_query(self) -> Result<RuleQuery, ApiError> {
    let scopes = match self.scopes {
      Some(list) => list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Scope>().map_err(|e| ApiError::BadRequest(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?,
      None => Vec::new(),
    };
    Ok(RuleQuery {
      scopes,
      technology: self.technology,
      client_name: self.client,
      project_path: self.project,
    })
  }
}

/// `GET /rules`
pub async fn list<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ValidationRule>>, ApiError> {
  let query = params.into_query()?;
  Ok(Json(state.engine.rules().rules_for_scope(&query).await?))
}

// ─── Authoring ───────────────────────────────────────────────────────────────

/// `POST /rules`
pub async fn create<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewValidationRule>,
) -> Result<impl IntoResponse, ApiError> {
  let rule = state.engine.rules().create_rule(body).await?;
  Ok((StatusCode::CREATED, Json(rule)))
}

/// `GET /rules/:id`
pub async fn get_one<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
) -> Result<Json<ValidationRule>, ApiError> {
  let rule = state
    .engine
    .rules()
    .get_rule(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("rule {id} not found")))?;
  Ok(Json(rule))
}

// ─── Applications ────────────────────────────────────────────────────────────

/// `GET /rules/:id/applications`
pub async fn applications<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<RuleApplication>>, ApiError> {
  if state.engine.rules().get_rule(&id).await?.is_none() {
    return Err(ApiError::NotFound(format!("rule {id} not found")));
  }
  let history = state
    .engine
    .store()
    .applications_for_rule(&id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(history))
}

/// `POST /applications`: records the application and refreshes the rule's
/// effectiveness score.
pub async fn record_application<S: LearningStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewRuleApplication>,
) -> Result<impl IntoResponse, ApiError> {
  let application = state.engine.tracker().record(body).await?;
  Ok((StatusCode::CREATED, Json(application)))
}
