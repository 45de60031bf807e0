//! Generated tools: executable templates derived from promoted patterns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::execution::Params;

/// Category assigned to every artifact produced by auto-generation.
pub const AUTOMATED_CATEGORY: &str = "automated";

/// One tool call inside a sequence template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStep {
  pub tool_name:  String,
  /// Parameters captured from the pattern; caller overrides win.
  pub parameters: Params,
}

/// The rendered body of an artifact, persisted as `code_content`.
///
/// Templates are declarative: the execution pipeline interprets them, the
/// learning core never runs untrusted code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactTemplate {
  /// Invoke each step in order, collecting results and errors independently.
  Sequence {
    name:        String,
    description: String,
    steps:       Vec<TemplateStep>,
  },
  /// Merge a fixed preset under caller overrides and delegate to the base
  /// tool.
  Preset {
    name:        String,
    description: String,
    base_tool:   String,
    preset:      Params,
  },
}

impl ArtifactTemplate {
  pub fn name(&self) -> &str {
    match self {
      Self::Sequence { name, .. } | Self::Preset { name, .. } => name,
    }
  }
}

/// A persisted artifact. Deactivated artifacts are kept for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTool {
  pub id:                Uuid,
  pub tool_name:         String,
  pub category:          String,
  pub source_pattern_id: Option<Uuid>,
  pub template:          ArtifactTemplate,
  /// The suggestion the artifact was rendered from.
  pub config:            serde_json::Value,
  pub is_active:         bool,
  pub usage_count:       u64,
  pub success_count:     u64,
  pub last_used_at:      Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::LearningStore::insert_artifact`].
#[derive(Debug, Clone)]
pub struct NewGeneratedTool {
  pub tool_name:         String,
  pub category:          String,
  pub source_pattern_id: Option<Uuid>,
  pub template:          ArtifactTemplate,
  pub config:            serde_json::Value,
}
