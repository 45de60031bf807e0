//! Learned patterns: recurring shapes mined from successful executions.
//!
//! A pattern is keyed by its signature. Re-observing a signature only ever
//! increases `occurrences` and `confidence`; pattern records are never
//! deleted, so they remain the provenance of any artifact generated from
//! them.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, execution::Params};

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
  /// An ordered run of tool invocations.
  Sequence,
  /// Constant/varying parameter structure of a single tool.
  Parameter,
}

impl PatternKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sequence => "sequence",
      Self::Parameter => "parameter",
    }
  }
}

impl fmt::Display for PatternKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PatternKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "sequence" => Ok(Self::Sequence),
      "parameter" => Ok(Self::Parameter),
      other => Err(Error::UnknownPatternKind(other.to_owned())),
    }
  }
}

// ─── Body ────────────────────────────────────────────────────────────────────

/// The primitive type of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
  Null,
  Boolean,
  Number,
  String,
  Array,
  Object,
}

impl ValueKind {
  pub fn of(value: &serde_json::Value) -> Self {
    use serde_json::Value;
    match value {
      Value::Null => Self::Null,
      Value::Bool(_) => Self::Boolean,
      Value::Number(_) => Self::Number,
      Value::String(_) => Self::String,
      Value::Array(_) => Self::Array,
      Value::Object(_) => Self::Object,
    }
  }
}

/// One step of a sequence pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
  pub tool_name:  String,
  /// Normalized parameter shape, e.g. `{limit=10,query=<string>}`.
  pub shape:      String,
  /// Literal parameters captured from the first observation.
  pub parameters: Params,
}

/// How the values of a common parameter key behave across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ValueClass {
  /// Identical in every call.
  Constant { value: serde_json::Value },
  /// Same primitive type, differing values.
  Variable { kind: ValueKind },
}

/// The serialized description stored with a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternBody {
  Sequence {
    steps: Vec<SequenceStep>,
  },
  Parameter {
    tool_name:    String,
    /// Keys present in every call.
    common_keys:  Vec<String>,
    /// Keys present in some but not all calls.
    varying_keys: Vec<String>,
    values:       BTreeMap<String, ValueClass>,
  },
}

impl PatternBody {
  pub fn kind(&self) -> PatternKind {
    match self {
      Self::Sequence { .. } => PatternKind::Sequence,
      Self::Parameter { .. } => PatternKind::Parameter,
    }
  }
}

// ─── Suggestion ──────────────────────────────────────────────────────────────

/// A prospective artifact described in plain terms; rendered into a template
/// by the artifact generator once the pattern is promoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
  Sequence {
    name:        String,
    description: String,
    steps:       Vec<SequenceStep>,
  },
  ParameterPreset {
    name:        String,
    description: String,
    base_tool:   String,
    preset:      Params,
  },
}

impl Suggestion {
  pub fn name(&self) -> &str {
    match self {
      Self::Sequence { name, .. } | Self::ParameterPreset { name, .. } => name,
    }
  }

  pub fn description(&self) -> &str {
    match self {
      Self::Sequence { description, .. }
      | Self::ParameterPreset { description, .. } => description,
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A candidate emitted by a mining pass, and the input to
/// [`crate::store::LearningStore::insert_pattern`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCandidate {
  pub signature:   String,
  pub body:        PatternBody,
  /// Times the signature was seen within this pass.
  pub occurrences: u32,
  pub confidence:  f64,
  pub suggestion:  Suggestion,
  pub first_seen:  DateTime<Utc>,
  pub last_seen:   DateTime<Utc>,
}

impl PatternCandidate {
  pub fn kind(&self) -> PatternKind { self.body.kind() }
}

/// A persisted pattern record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPattern {
  pub id:           Uuid,
  pub signature:    String,
  pub kind:         PatternKind,
  pub body:         PatternBody,
  pub occurrences:  u32,
  pub confidence:   f64,
  pub suggestion:   Option<Suggestion>,
  /// Back-reference to the generated artifact, once one exists.
  pub tool_id:      Option<Uuid>,
  pub auto_created: bool,
  pub first_seen:   DateTime<Utc>,
  pub last_seen:    DateTime<Utc>,
}
