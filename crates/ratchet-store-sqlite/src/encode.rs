//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds,
//! `Z` suffix) so that string comparison in SQL orders them correctly.
//! Structured fields are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use ratchet_core::{
  artifact::GeneratedTool,
  execution::{Params, ToolExecution},
  knowledge::KnowledgeEntry,
  pattern::LearnedPattern,
  rule::{ApplicationStats, RuleApplication, ValidationRule},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// The current time at the precision the store persists.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn decode_opt_json<T: serde::de::DeserializeOwned>(
  s: Option<String>,
) -> Result<Option<T>> {
  Ok(s.as_deref().map(serde_json::from_str).transpose()?)
}

/// SQLite integers are signed; counters never go negative.
pub fn to_u64(n: i64) -> u64 { n.max(0) as u64 }

// ─── Executions ──────────────────────────────────────────────────────────────

pub const EXECUTION_COLUMNS: &str = "id, tool_name, parameters, result, success, \
   error_message, execution_time_ms, session_id, created_at, completed_at";

/// Raw strings read directly from a `tool_executions` row.
pub struct RawExecution {
  pub id:                String,
  pub tool_name:         String,
  pub parameters:        String,
  pub result:            Option<String>,
  pub success:           bool,
  pub error_message:     Option<String>,
  pub execution_time_ms: Option<i64>,
  pub session_id:        Option<String>,
  pub created_at:        String,
  pub completed_at:      Option<String>,
}

impl RawExecution {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      tool_name:         row.get(1)?,
      parameters:        row.get(2)?,
      result:            row.get(3)?,
      success:           row.get(4)?,
      error_message:     row.get(5)?,
      execution_time_ms: row.get(6)?,
      session_id:        row.get(7)?,
      created_at:        row.get(8)?,
      completed_at:      row.get(9)?,
    })
  }

  pub fn into_execution(self) -> Result<ToolExecution> {
    let parameters: Params = serde_json::from_str(&self.parameters)?;
    Ok(ToolExecution {
      id: decode_uuid(&self.id)?,
      tool_name: self.tool_name,
      parameters,
      result: decode_opt_json(self.result)?,
      success: self.success,
      error_message: self.error_message,
      execution_time_ms: self.execution_time_ms.map(to_u64),
      session_id: self.session_id,
      created_at: decode_dt(&self.created_at)?,
      completed_at: decode_opt_dt(self.completed_at)?,
    })
  }
}

// ─── Patterns ────────────────────────────────────────────────────────────────

pub const PATTERN_COLUMNS: &str = "id, pattern_signature, pattern_type, \
   pattern_data, occurrences, confidence, tool_suggestion, tool_id, \
   auto_created, first_seen, last_seen";

pub struct RawPattern {
  pub id:              String,
  pub signature:       String,
  pub pattern_type:    String,
  pub pattern_data:    String,
  pub occurrences:     i64,
  pub confidence:      f64,
  pub tool_suggestion: Option<String>,
  pub tool_id:         Option<String>,
  pub auto_created:    bool,
  pub first_seen:      String,
  pub last_seen:       String,
}

impl RawPattern {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      signature:       row.get(1)?,
      pattern_type:    row.get(2)?,
      pattern_data:    row.get(3)?,
      occurrences:     row.get(4)?,
      confidence:      row.get(5)?,
      tool_suggestion: row.get(6)?,
      tool_id:         row.get(7)?,
      auto_created:    row.get(8)?,
      first_seen:      row.get(9)?,
      last_seen:       row.get(10)?,
    })
  }

  pub fn into_pattern(self) -> Result<LearnedPattern> {
    Ok(LearnedPattern {
      id:           decode_uuid(&self.id)?,
      signature:    self.signature,
      kind:         self.pattern_type.parse()?,
      body:         serde_json::from_str(&self.pattern_data)?,
      occurrences:  u32::try_from(self.occurrences).unwrap_or(u32::MAX),
      confidence:   self.confidence,
      suggestion:   decode_opt_json(self.tool_suggestion)?,
      tool_id:      self.tool_id.as_deref().map(decode_uuid).transpose()?,
      auto_created: self.auto_created,
      first_seen:   decode_dt(&self.first_seen)?,
      last_seen:    decode_dt(&self.last_seen)?,
    })
  }
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

pub const ARTIFACT_COLUMNS: &str = "id, tool_name, category, \
   source_pattern_id, code_content, config, is_active, usage_count, \
   success_count, last_used_at, created_at";

pub struct RawArtifact {
  pub id:                String,
  pub tool_name:         String,
  pub category:          String,
  pub source_pattern_id: Option<String>,
  pub code_content:      String,
  pub config:            String,
  pub is_active:         bool,
  pub usage_count:       i64,
  pub success_count:     i64,
  pub last_used_at:      Option<String>,
  pub created_at:        String,
}

impl RawArtifact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      tool_name:         row.get(1)?,
      category:          row.get(2)?,
      source_pattern_id: row.get(3)?,
      code_content:      row.get(4)?,
      config:            row.get(5)?,
      is_active:         row.get(6)?,
      usage_count:       row.get(7)?,
      success_count:     row.get(8)?,
      last_used_at:      row.get(9)?,
      created_at:        row.get(10)?,
    })
  }

  pub fn into_artifact(self) -> Result<GeneratedTool> {
    Ok(GeneratedTool {
      id:                decode_uuid(&self.id)?,
      tool_name:         self.tool_name,
      category:          self.category,
      source_pattern_id: self
        .source_pattern_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      template:          serde_json::from_str(&self.code_content)?,
      config:            serde_json::from_str(&self.config)?,
      is_active:         self.is_active,
      usage_count:       to_u64(self.usage_count),
      success_count:     to_u64(self.success_count),
      last_used_at:      decode_opt_dt(self.last_used_at)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

pub const RULE_COLUMNS: &str = "rule_id, scope, category, priority, \
   technology, pattern, message, suggestion, auto_fix, client_name, \
   project_path, confidence, effectiveness_score, is_active, learned_from, \
   created_at, updated_at, scope_changed_at";

/// `RULE_COLUMNS` qualified with the `r.` table alias, for joins.
pub const RULE_COLUMNS_R: &str = "r.rule_id, r.scope, r.category, r.priority, \
   r.technology, r.pattern, r.message, r.suggestion, r.auto_fix, \
   r.client_name, r.project_path, r.confidence, r.effectiveness_score, \
   r.is_active, r.learned_from, r.created_at, r.updated_at, \
   r.scope_changed_at";

/// Number of columns in [`RULE_COLUMNS`]; aggregate columns follow them.
pub const RULE_COLUMN_COUNT: usize = 18;

pub struct RawRule {
  pub rule_id:             String,
  pub scope:               String,
  pub category:            String,
  pub priority:            String,
  pub technology:          Option<String>,
  pub pattern:             String,
  pub message:             String,
  pub suggestion:          Option<String>,
  pub auto_fix:            Option<String>,
  pub client_name:         Option<String>,
  pub project_path:        Option<String>,
  pub confidence:          f64,
  pub effectiveness_score: f64,
  pub is_active:           bool,
  pub learned_from:        Option<String>,
  pub created_at:          String,
  pub updated_at:          String,
  pub scope_changed_at:    String,
}

impl RawRule {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rule_id:             row.get(0)?,
      scope:               row.get(1)?,
      category:            row.get(2)?,
      priority:            row.get(3)?,
      technology:          row.get(4)?,
      pattern:             row.get(5)?,
      message:             row.get(6)?,
      suggestion:          row.get(7)?,
      auto_fix:            row.get(8)?,
      client_name:         row.get(9)?,
      project_path:        row.get(10)?,
      confidence:          row.get(11)?,
      effectiveness_score: row.get(12)?,
      is_active:           row.get(13)?,
      learned_from:        row.get(14)?,
      created_at:          row.get(15)?,
      updated_at:          row.get(16)?,
      scope_changed_at:    row.get(17)?,
    })
  }

  pub fn into_rule(self) -> Result<ValidationRule> {
    Ok(ValidationRule {
      rule_id:             self.rule_id,
      scope:               self.scope.parse()?,
      category:            self.category,
      priority:            self.priority.parse()?,
      technology:          self.technology,
      pattern:             self.pattern,
      message:             self.message,
      suggestion:          self.suggestion,
      auto_fix:            self.auto_fix,
      client_name:         self.client_name,
      project_path:        self.project_path,
      confidence:          self.confidence,
      effectiveness_score: self.effectiveness_score,
      is_active:           self.is_active,
      learned_from:        self.learned_from,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
      scope_changed_at:    decode_dt(&self.scope_changed_at)?,
    })
  }
}

/// Aggregate columns selected after a rule's own columns.
pub struct RawStats {
  pub applications:       i64,
  pub successes:          i64,
  pub false_positives:    i64,
  pub fixes_applied:      i64,
  pub total_execution_ms: i64,
  pub distinct_projects:  i64,
  pub distinct_clients:   i64,
}

impl RawStats {
  /// Read seven aggregate columns starting at `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      applications:       row.get(offset)?,
      successes:          row.get(offset + 1)?,
      false_positives:    row.get(offset + 2)?,
      fixes_applied:      row.get(offset + 3)?,
      total_execution_ms: row.get(offset + 4)?,
      distinct_projects:  row.get(offset + 5)?,
      distinct_clients:   row.get(offset + 6)?,
    })
  }

  pub fn into_stats(self, top_client: Option<String>) -> ApplicationStats {
    ApplicationStats {
      applications: to_u64(self.applications),
      successes: to_u64(self.successes),
      false_positives: to_u64(self.false_positives),
      fixes_applied: to_u64(self.fixes_applied),
      total_execution_ms: to_u64(self.total_execution_ms),
      distinct_projects: to_u64(self.distinct_projects),
      distinct_clients: to_u64(self.distinct_clients),
      top_client,
    }
  }
}

// ─── Applications ────────────────────────────────────────────────────────────

pub const APPLICATION_COLUMNS: &str = "id, rule_id, project_path, \
   client_name, file_path, line_number, success, false_positive, \
   fix_applied, execution_time_ms, feedback, context, applied_at";

pub struct RawApplication {
  pub id:                String,
  pub rule_id:           String,
  pub project_path:      Option<String>,
  pub client_name:       Option<String>,
  pub file_path:         Option<String>,
  pub line_number:       Option<i64>,
  pub success:           bool,
  pub false_positive:    bool,
  pub fix_applied:       bool,
  pub execution_time_ms: Option<i64>,
  pub feedback:          Option<String>,
  pub context:           Option<String>,
  pub applied_at:        String,
}

impl RawApplication {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      rule_id:           row.get(1)?,
      project_path:      row.get(2)?,
      client_name:       row.get(3)?,
      file_path:         row.get(4)?,
      line_number:       row.get(5)?,
      success:           row.get(6)?,
      false_positive:    row.get(7)?,
      fix_applied:       row.get(8)?,
      execution_time_ms: row.get(9)?,
      feedback:          row.get(10)?,
      context:           row.get(11)?,
      applied_at:        row.get(12)?,
    })
  }

  pub fn into_application(self) -> Result<RuleApplication> {
    Ok(RuleApplication {
      id:                decode_uuid(&self.id)?,
      rule_id:           self.rule_id,
      project_path:      self.project_path,
      client_name:       self.client_name,
      file_path:         self.file_path,
      line_number:       self.line_number.and_then(|n| u32::try_from(n).ok()),
      success:           self.success,
      false_positive:    self.false_positive,
      fix_applied:       self.fix_applied,
      execution_time_ms: self.execution_time_ms.map(to_u64),
      feedback:          self.feedback,
      context:           self.context,
      applied_at:        decode_dt(&self.applied_at)?,
    })
  }
}

// ─── Knowledge ───────────────────────────────────────────────────────────────

pub const KNOWLEDGE_COLUMNS: &str =
  "id, entry_type, title, content, tags, created_at";

pub struct RawKnowledge {
  pub id:         String,
  pub entry_type: String,
  pub title:      String,
  pub content:    String,
  pub tags:       String,
  pub created_at: String,
}

impl RawKnowledge {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      entry_type: row.get(1)?,
      title:      row.get(2)?,
      content:    row.get(3)?,
      tags:       row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
      id:         decode_uuid(&self.id)?,
      entry_type: self.entry_type.parse()?,
      title:      self.title,
      content:    serde_json::from_str(&self.content)?,
      tags:       serde_json::from_str(&self.tags)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
