//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request is valid but clashes with current state, e.g. a run that
  /// is already in progress elsewhere.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<ratchet_engine::Error> for ApiError {
  fn from(e: ratchet_engine::Error) -> Self {
    use ratchet_engine::Error as E;
    match e {
      E::InvalidRule(_) | E::InvalidPattern { .. } => Self::BadRequest(e.to_string()),
      E::DuplicateRule(_) | E::ArtifactInactive(_) => Self::Conflict(e.to_string()),
      E::RuleNotFound(_) | E::ArtifactNotFound(_) => Self::NotFound(e.to_string()),
      E::Store(inner) => Self::Store(inner),
      E::Serialization(inner) => Self::store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure while serving request");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
