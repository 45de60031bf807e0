//! Validation rules and the evidence of their applications.
//!
//! A rule's `rule_id` is stable for its whole life. Promotion widens
//! `scope` in place; deactivation clears `is_active` and is terminal.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Scope};

// ─── Priority ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

impl Priority {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Priority {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      "critical" => Ok(Self::Critical),
      other => Err(Error::UnknownPriority(other.to_owned())),
    }
  }
}

// ─── Rule ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
  pub rule_id:             String,
  pub scope:               Scope,
  pub category:            String,
  pub priority:            Priority,
  pub technology:          Option<String>,
  /// Regular expression matched against inspected input.
  pub pattern:             String,
  pub message:             String,
  pub suggestion:          Option<String>,
  pub auto_fix:            Option<String>,
  /// Owning client; required for `client` visibility.
  pub client_name:         Option<String>,
  /// Owning project; required for `project` visibility.
  pub project_path:        Option<String>,
  pub confidence:          f64,
  pub effectiveness_score: f64,
  pub is_active:           bool,
  pub learned_from:        Option<String>,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  /// When the rule was authored or last promoted. Promotion evidence is
  /// only counted from this point on.
  pub scope_changed_at:    DateTime<Utc>,
}

impl ValidationRule {
  /// Whether a query issued with this identity may see the rule.
  pub fn visible_to(&self, client: Option<&str>, project: Option<&str>) -> bool {
    match self.scope {
      Scope::Global | Scope::Organization => true,
      Scope::Client => {
        client.is_some() && self.client_name.as_deref() == client
      }
      Scope::Project => {
        project.is_some() && self.project_path.as_deref() == project
      }
    }
  }
}

/// Input to [`crate::store::LearningStore::create_rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewValidationRule {
  /// Generated when absent.
  pub rule_id:      Option<String>,
  pub scope:        Scope,
  pub category:     String,
  #[serde(default)]
  pub priority:     Priority,
  pub technology:   Option<String>,
  pub pattern:      String,
  pub message:      String,
  pub suggestion:   Option<String>,
  pub auto_fix:     Option<String>,
  pub client_name:  Option<String>,
  pub project_path: Option<String>,
  /// Prior confidence for the new rule.
  #[serde(default = "default_confidence")]
  pub confidence:   f64,
  pub learned_from: Option<String>,
}

fn default_confidence() -> f64 { 0.5 }

impl NewValidationRule {
  pub fn new(
    scope: Scope,
    category: impl Into<String>,
    pattern: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self {
      rule_id: None,
      scope,
      category: category.into(),
      priority: Priority::default(),
      technology: None,
      pattern: pattern.into(),
      message: message.into(),
      suggestion: None,
      auto_fix: None,
      client_name: None,
      project_path: None,
      confidence: default_confidence(),
      learned_from: None,
    }
  }

  pub fn for_client(mut self, client: impl Into<String>) -> Self {
    self.client_name = Some(client.into());
    self
  }

  pub fn for_project(mut self, project: impl Into<String>) -> Self {
    self.project_path = Some(project.into());
    self
  }

  pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
    self.technology = Some(technology.into());
    self
  }
}

/// Parameters for [`crate::store::LearningStore::rules_for_scope`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleQuery {
  /// Permitted scopes; empty means all.
  #[serde(default)]
  pub scopes:       Vec<Scope>,
  pub technology:   Option<String>,
  pub client_name:  Option<String>,
  pub project_path: Option<String>,
}

// ─── Applications ────────────────────────────────────────────────────────────

/// One evaluation of a rule against real input. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleApplication {
  pub id:                Uuid,
  pub rule_id:           String,
  pub project_path:      Option<String>,
  pub client_name:       Option<String>,
  pub file_path:         Option<String>,
  pub line_number:       Option<u32>,
  pub success:           bool,
  pub false_positive:    bool,
  pub fix_applied:       bool,
  pub execution_time_ms: Option<u64>,
  /// Free-text feedback from the user who saw the result.
  pub feedback:          Option<String>,
  /// The inspected snippet, when the validator reported one.
  pub context:           Option<String>,
  pub applied_at:        DateTime<Utc>,
}

/// Input to [`crate::store::LearningStore::record_application`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRuleApplication {
  pub rule_id:           String,
  pub project_path:      Option<String>,
  pub client_name:       Option<String>,
  pub file_path:         Option<String>,
  pub line_number:       Option<u32>,
  pub success:           bool,
  #[serde(default)]
  pub false_positive:    bool,
  #[serde(default)]
  pub fix_applied:       bool,
  pub execution_time_ms: Option<u64>,
  pub feedback:          Option<String>,
  pub context:           Option<String>,
  /// Defaults to now; accepted so validators can report late.
  pub applied_at:        Option<DateTime<Utc>>,
}

/// Aggregated application evidence for one rule over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStats {
  pub applications:       u64,
  pub successes:          u64,
  pub false_positives:    u64,
  pub fixes_applied:      u64,
  pub total_execution_ms: u64,
  pub distinct_projects:  u64,
  pub distinct_clients:   u64,
  /// The client with the most applications in the window.
  pub top_client:         Option<String>,
}

impl ApplicationStats {
  pub fn success_rate(&self) -> f64 { ratio(self.successes, self.applications) }

  pub fn false_positive_rate(&self) -> f64 {
    ratio(self.false_positives, self.applications)
  }

  pub fn avg_execution_ms(&self) -> f64 {
    ratio(self.total_execution_ms, self.applications)
  }
}

fn ratio(n: u64, d: u64) -> f64 {
  if d == 0 { 0.0 } else { n as f64 / d as f64 }
}

/// A rule together with its aggregated evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvidence {
  pub rule:  ValidationRule,
  pub stats: ApplicationStats,
}
