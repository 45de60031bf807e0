//! Error type for `ratchet-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ratchet_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("execution not found: {0}")]
  ExecutionNotFound(uuid::Uuid),

  #[error("execution {0} is already completed")]
  AlreadyCompleted(uuid::Uuid),

  #[error("rule not found: {0}")]
  RuleNotFound(String),

  #[error("rule already exists: {0}")]
  DuplicateRule(String),

  #[error("pattern already exists: {0}")]
  DuplicatePattern(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
