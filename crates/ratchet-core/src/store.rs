//! The `LearningStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `ratchet-store-sqlite`). The engine and the API depend on this
//! abstraction, not on any concrete backend.
//!
//! Counter and scope updates are expressed as single conditional writes
//! (`observe_pattern`, `link_artifact`, `promote_rule`, `deactivate_rule`)
//! rather than read-modify-write pairs, so two passes racing on one store
//! cannot lose increments or promote a rule twice.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  Scope,
  artifact::{GeneratedTool, NewGeneratedTool},
  execution::{ExecutionOutcome, NewToolExecution, ToolExecution},
  knowledge::{EntryType, KnowledgeEntry, NewKnowledgeEntry},
  pattern::{LearnedPattern, PatternCandidate, PatternKind},
  rule::{
    ApplicationStats, NewRuleApplication, NewValidationRule, RuleApplication,
    RuleEvidence, RuleQuery, ValidationRule,
  },
};

/// Abstraction over a ratchet store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LearningStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Executions ────────────────────────────────────────────────────────

  /// Record the start of a tool invocation. `created_at` is set by the
  /// store; the row starts unsuccessful and incomplete.
  fn record_execution(
    &self,
    input: NewToolExecution,
  ) -> impl Future<Output = Result<ToolExecution, Self::Error>> + Send + '_;

  /// Finalize an invocation. Fails if the execution does not exist or was
  /// already completed.
  fn complete_execution(
    &self,
    id: Uuid,
    outcome: ExecutionOutcome,
  ) -> impl Future<Output = Result<ToolExecution, Self::Error>> + Send + '_;

  fn get_execution(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ToolExecution>, Self::Error>> + Send + '_;

  /// Successful, completed executions created at or after `since`, oldest
  /// first, at most `limit` of the most recent. Rows whose stored
  /// parameters cannot be decoded are skipped.
  fn successful_executions_since(
    &self,
    since: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ToolExecution>, Self::Error>> + Send + '_;

  // ── Patterns ──────────────────────────────────────────────────────────

  fn get_pattern<'a>(
    &'a self,
    signature: &'a str,
  ) -> impl Future<Output = Result<Option<LearnedPattern>, Self::Error>> + Send + 'a;

  /// Insert a first observation of a signature.
  fn insert_pattern<'a>(
    &'a self,
    candidate: &'a PatternCandidate,
  ) -> impl Future<Output = Result<LearnedPattern, Self::Error>> + Send + 'a;

  /// Re-observe an existing signature: `occurrences + 1` and
  /// `confidence + step` capped at 1.0, in one write. Returns `None` if the
  /// signature is unknown.
  fn observe_pattern<'a>(
    &'a self,
    signature: &'a str,
    confidence_step: f64,
    seen_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<LearnedPattern>, Self::Error>> + Send + 'a;

  /// Set the artifact back-reference if, and only if, none is set yet.
  /// Returns whether this call set it.
  fn link_artifact(
    &self,
    pattern_id: Uuid,
    tool_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_patterns(
    &self,
    kind: Option<PatternKind>,
  ) -> impl Future<Output = Result<Vec<LearnedPattern>, Self::Error>> + Send + '_;

  // ── Artifacts ─────────────────────────────────────────────────────────

  fn insert_artifact(
    &self,
    input: NewGeneratedTool,
  ) -> impl Future<Output = Result<GeneratedTool, Self::Error>> + Send + '_;

  fn get_artifact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<GeneratedTool>, Self::Error>> + Send + '_;

  fn list_artifacts(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<GeneratedTool>, Self::Error>> + Send + '_;

  /// Returns whether the artifact was active before the call.
  fn deactivate_artifact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn record_artifact_usage(
    &self,
    id: Uuid,
    success: bool,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Rules ─────────────────────────────────────────────────────────────

  /// Persist a new, active rule. Input validation is the caller's job.
  fn create_rule(
    &self,
    input: NewValidationRule,
  ) -> impl Future<Output = Result<ValidationRule, Self::Error>> + Send + '_;

  fn get_rule<'a>(
    &'a self,
    rule_id: &'a str,
  ) -> impl Future<Output = Result<Option<ValidationRule>, Self::Error>> + Send + 'a;

  /// Active rules visible to the query's identity. See
  /// [`ValidationRule::visible_to`].
  fn rules_for_scope<'a>(
    &'a self,
    query: &'a RuleQuery,
  ) -> impl Future<Output = Result<Vec<ValidationRule>, Self::Error>> + Send + 'a;

  fn active_rules(
    &self,
  ) -> impl Future<Output = Result<Vec<ValidationRule>, Self::Error>> + Send + '_;

  /// Widen a rule's scope from `from` to `to`, provided it is still active
  /// and at `from`. `client_name` is filled only if the rule has none.
  /// Returns whether the rule was changed.
  fn promote_rule<'a>(
    &'a self,
    rule_id: &'a str,
    from: Scope,
    to: Scope,
    client_name: Option<String>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn update_rule_pattern<'a>(
    &'a self,
    rule_id: &'a str,
    pattern: String,
    confidence: f64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn set_rule_confidence<'a>(
    &'a self,
    rule_id: &'a str,
    confidence: f64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn set_rule_effectiveness<'a>(
    &'a self,
    rule_id: &'a str,
    score: f64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Clear `is_active`. Returns whether the rule was active before.
  fn deactivate_rule<'a>(
    &'a self,
    rule_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Applications ──────────────────────────────────────────────────────

  /// Append an application. Fails if the rule does not exist.
  fn record_application(
    &self,
    input: NewRuleApplication,
  ) -> impl Future<Output = Result<RuleApplication, Self::Error>> + Send + '_;

  fn application_stats<'a>(
    &'a self,
    rule_id: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<ApplicationStats, Self::Error>> + Send + 'a;

  /// Active rules below `global` with at least `min_applications` counted
  /// from `max(since, scope_changed_at)`, with their aggregated evidence.
  fn promotion_candidates(
    &self,
    since: DateTime<Utc>,
    min_applications: u64,
  ) -> impl Future<Output = Result<Vec<RuleEvidence>, Self::Error>> + Send + '_;

  /// Active rules with at least `min_applications` since `since`.
  fn deactivation_candidates(
    &self,
    since: DateTime<Utc>,
    min_applications: u64,
  ) -> impl Future<Output = Result<Vec<RuleEvidence>, Self::Error>> + Send + '_;

  /// Full application history of a rule, oldest first.
  fn applications_for_rule<'a>(
    &'a self,
    rule_id: &'a str,
  ) -> impl Future<Output = Result<Vec<RuleApplication>, Self::Error>> + Send + 'a;

  /// Failed applications since `since` that carry feedback which has not
  /// been learned from yet.
  fn pending_feedback(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<RuleApplication>, Self::Error>> + Send + '_;

  fn mark_feedback_processed(
    &self,
    application_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Knowledge ─────────────────────────────────────────────────────────

  fn record_knowledge(
    &self,
    input: NewKnowledgeEntry,
  ) -> impl Future<Output = Result<KnowledgeEntry, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_knowledge(
    &self,
    entry_type: Option<EntryType>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<KnowledgeEntry>, Self::Error>> + Send + '_;

  // ── Leases ────────────────────────────────────────────────────────────

  /// Take the named lease for `ttl` if it is free or expired. A lease is not
  /// re-entrant: a second call while it is live fails, even from `holder`.
  /// Returns whether `holder` now owns it.
  fn try_acquire_lease<'a>(
    &'a self,
    name: &'a str,
    holder: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn release_lease<'a>(
    &'a self,
    name: &'a str,
    holder: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
