//! Error type for `ratchet-engine`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid rule: {0}")]
  InvalidRule(String),

  #[error("invalid rule pattern {pattern:?}: {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source:  regex::Error,
  },

  #[error("rule already exists: {0}")]
  DuplicateRule(String),

  #[error("rule not found: {0}")]
  RuleNotFound(String),

  #[error("artifact not found: {0}")]
  ArtifactNotFound(Uuid),

  #[error("artifact {0} is inactive")]
  ArtifactInactive(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
