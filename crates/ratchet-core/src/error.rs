//! Error types for `ratchet-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown scope: {0:?}")]
  UnknownScope(String),

  #[error("unknown pattern kind: {0:?}")]
  UnknownPatternKind(String),

  #[error("unknown knowledge entry type: {0:?}")]
  UnknownEntryType(String),

  #[error("unknown rule priority: {0:?}")]
  UnknownPriority(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
