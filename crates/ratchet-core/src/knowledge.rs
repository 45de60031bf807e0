//! Knowledge entries: the append-only audit trail read by dashboards.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
  RulePromotion,
  SystemActivity,
  Error,
  Documentation,
}

impl EntryType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::RulePromotion => "rule_promotion",
      Self::SystemActivity => "system_activity",
      Self::Error => "error",
      Self::Documentation => "documentation",
    }
  }
}

impl fmt::Display for EntryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntryType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "rule_promotion" => Ok(Self::RulePromotion),
      "system_activity" => Ok(Self::SystemActivity),
      "error" => Ok(Self::Error),
      "documentation" => Ok(Self::Documentation),
      other => Err(Error::UnknownEntryType(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
  pub id:         Uuid,
  pub entry_type: EntryType,
  pub title:      String,
  /// JSON payload; shape depends on `entry_type`.
  pub content:    serde_json::Value,
  pub tags:       Vec<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::LearningStore::record_knowledge`].
#[derive(Debug, Clone)]
pub struct NewKnowledgeEntry {
  pub entry_type: EntryType,
  pub title:      String,
  pub content:    serde_json::Value,
  pub tags:       Vec<String>,
}

impl NewKnowledgeEntry {
  pub fn new(
    entry_type: EntryType,
    title: impl Into<String>,
    content: serde_json::Value,
  ) -> Self {
    Self { entry_type, title: title.into(), content, tags: Vec::new() }
  }

  pub fn tagged<I, T>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.tags.extend(tags.into_iter().map(Into::into));
    self
  }
}
