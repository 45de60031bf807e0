//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use ratchet_core::{
  Scope,
  artifact::{AUTOMATED_CATEGORY, ArtifactTemplate, NewGeneratedTool},
  execution::{ExecutionOutcome, NewToolExecution, Params},
  knowledge::{EntryType, NewKnowledgeEntry},
  pattern::{PatternBody, PatternCandidate, PatternKind, SequenceStep, Suggestion},
  rule::{NewRuleApplication, NewValidationRule, Priority, RuleQuery},
  store::LearningStore,
};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn params(value: serde_json::Value) -> Params {
  serde_json::from_value(value).expect("object params")
}

// ─── Executions ──────────────────────────────────────────────────────────────

async fn run(s: &SqliteStore, tool: &str, p: serde_json::Value) -> Uuid {
  let exec = s
    .record_execution(NewToolExecution::new(tool, params(p)))
    .await
    .unwrap();
  s.complete_execution(exec.id, ExecutionOutcome::succeeded(None))
    .await
    .unwrap();
  exec.id
}

#[tokio::test]
async fn record_and_complete_execution() {
  let s = store().await;

  let exec = s
    .record_execution(
      NewToolExecution::new("search", params(json!({ "query": "rust" })))
        .in_session("s-1"),
    )
    .await
    .unwrap();
  assert!(!exec.is_completed());
  assert!(!exec.success);

  let done = s
    .complete_execution(exec.id, ExecutionOutcome {
      success:           true,
      result:            Some(json!({ "hits": 3 })),
      error_message:     None,
      execution_time_ms: Some(42),
    })
    .await
    .unwrap();
  assert!(done.success);
  assert!(done.is_completed());
  assert_eq!(done.execution_time_ms, Some(42));
  assert_eq!(done.result, Some(json!({ "hits": 3 })));
  assert_eq!(done.session_id.as_deref(), Some("s-1"));
  assert_eq!(done.parameters["query"], json!("rust"));
}

#[tokio::test]
async fn complete_execution_twice_fails() {
  let s = store().await;
  let id = run(&s, "search", json!({})).await;

  let err = s
    .complete_execution(id, ExecutionOutcome::failed("late"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyCompleted(e) if e == id));

  // The first outcome stands.
  let exec = s.get_execution(id).await.unwrap().unwrap();
  assert!(exec.success);
}

#[tokio::test]
async fn complete_missing_execution_fails() {
  let s = store().await;
  let id = Uuid::new_v4();
  let err = s
    .complete_execution(id, ExecutionOutcome::succeeded(None))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ExecutionNotFound(e) if e == id));
}

#[tokio::test]
async fn successful_executions_are_chronological_and_filtered() {
  let s = store().await;
  let since = Utc::now() - Duration::minutes(1);

  let a = run(&s, "a", json!({})).await;
  let failed = s
    .record_execution(NewToolExecution::new("b", Params::new()))
    .await
    .unwrap();
  s.complete_execution(failed.id, ExecutionOutcome::failed("boom"))
    .await
    .unwrap();
  // Never completed.
  s.record_execution(NewToolExecution::new("c", Params::new()))
    .await
    .unwrap();
  let d = run(&s, "d", json!({})).await;

  let execs = s.successful_executions_since(since, 100).await.unwrap();
  let ids: Vec<Uuid> = execs.iter().map(|e| e.id).collect();
  assert_eq!(ids, vec![a, d]);
}

#[tokio::test]
async fn successful_executions_limit_keeps_most_recent() {
  let s = store().await;
  let since = Utc::now() - Duration::minutes(1);

  let mut ids = Vec::new();
  for i in 0..5 {
    ids.push(run(&s, &format!("t{i}"), json!({})).await);
  }

  let execs = s.successful_executions_since(since, 2).await.unwrap();
  let got: Vec<Uuid> = execs.iter().map(|e| e.id).collect();
  assert_eq!(got, ids[3..].to_vec());
}

#[tokio::test]
async fn malformed_parameters_are_skipped() {
  let s = store().await;
  let since = Utc::now() - Duration::minutes(1);
  let good = run(&s, "read", json!({ "path": "a" })).await;
  run(&s, "broken", json!({})).await;
  run(&s, "listed", json!({})).await;
  let last = run(&s, "write", json!({ "path": "b" })).await;

  s.execute_raw("UPDATE tool_executions SET parameters = '{not json' WHERE tool_name = 'broken'")
    .await
    .unwrap();
  s.execute_raw("UPDATE tool_executions SET parameters = '[1, 2]' WHERE tool_name = 'listed'")
    .await
    .unwrap();

  let window = s.successful_executions_since(since, 100).await.unwrap();
  let ids: Vec<Uuid> = window.iter().map(|e| e.id).collect();
  assert_eq!(ids, [good, last]);
}

// ─── Patterns ────────────────────────────────────────────────────────────────

fn candidate(signature: &str) -> PatternCandidate {
  let steps = vec![
    SequenceStep {
      tool_name:  "read".into(),
      shape:      "{path=<string>}".into(),
      parameters: Params::new(),
    },
    SequenceStep {
      tool_name:  "write".into(),
      shape:      "{}".into(),
      parameters: Params::new(),
    },
  ];
  let now = Utc::now();
  PatternCandidate {
    signature:   signature.into(),
    body:        PatternBody::Sequence { steps: steps.clone() },
    occurrences: 2,
    confidence:  0.4,
    suggestion:  Suggestion::Sequence {
      name: "auto_read_write".into(),
      description: "read then write".into(),
      steps,
    },
    first_seen:  now,
    last_seen:   now,
  }
}

#[tokio::test]
async fn insert_and_get_pattern() {
  let s = store().await;
  let inserted = s.insert_pattern(&candidate("read:{}->write:{}")).await.unwrap();
  assert_eq!(inserted.kind, PatternKind::Sequence);
  assert_eq!(inserted.occurrences, 2);
  assert!(inserted.tool_id.is_none());

  let fetched = s.get_pattern("read:{}->write:{}").await.unwrap().unwrap();
  assert_eq!(fetched.id, inserted.id);
  assert_eq!(fetched.body, inserted.body);
  assert_eq!(fetched.suggestion, inserted.suggestion);
}

#[tokio::test]
async fn insert_duplicate_signature_fails() {
  let s = store().await;
  s.insert_pattern(&candidate("sig")).await.unwrap();
  let err = s.insert_pattern(&candidate("sig")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicatePattern(sig) if sig == "sig"));
}

#[tokio::test]
async fn observe_pattern_increments_and_caps_confidence() {
  let s = store().await;
  s.insert_pattern(&candidate("sig")).await.unwrap();

  let seen = Utc::now();
  let mut last = None;
  for _ in 0..8 {
    last = s.observe_pattern("sig", 0.1, seen).await.unwrap();
  }
  let pattern = last.unwrap();
  assert_eq!(pattern.occurrences, 10);
  assert!((pattern.confidence - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn observe_unknown_pattern_returns_none() {
  let s = store().await;
  assert!(s.observe_pattern("nope", 0.1, Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_patterns_filters_by_kind() {
  let s = store().await;
  s.insert_pattern(&candidate("one")).await.unwrap();
  s.insert_pattern(&candidate("two")).await.unwrap();

  assert_eq!(s.list_patterns(None).await.unwrap().len(), 2);
  assert_eq!(
    s.list_patterns(Some(PatternKind::Sequence)).await.unwrap().len(),
    2
  );
  assert!(
    s.list_patterns(Some(PatternKind::Parameter))
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

fn artifact(name: &str, pattern_id: Option<Uuid>) -> NewGeneratedTool {
  NewGeneratedTool {
    tool_name:         name.into(),
    category:          AUTOMATED_CATEGORY.into(),
    source_pattern_id: pattern_id,
    template:          ArtifactTemplate::Preset {
      name:        name.into(),
      description: "preset".into(),
      base_tool:   "search".into(),
      preset:      params(json!({ "limit": 10 })),
    },
    config:            json!({}),
  }
}

#[tokio::test]
async fn link_artifact_only_once() {
  let s = store().await;
  let pattern = s.insert_pattern(&candidate("sig")).await.unwrap();
  let first = s.insert_artifact(artifact("first", Some(pattern.id))).await.unwrap();
  let second = s.insert_artifact(artifact("second", Some(pattern.id))).await.unwrap();

  assert!(s.link_artifact(pattern.id, first.id).await.unwrap());
  assert!(!s.link_artifact(pattern.id, second.id).await.unwrap());

  let stored = s.get_pattern("sig").await.unwrap().unwrap();
  assert_eq!(stored.tool_id, Some(first.id));
  assert!(stored.auto_created);
}

#[tokio::test]
async fn deactivate_artifact_keeps_row() {
  let s = store().await;
  let tool = s.insert_artifact(artifact("preset_search", None)).await.unwrap();
  assert!(tool.is_active);

  assert!(s.deactivate_artifact(tool.id).await.unwrap());
  assert!(!s.deactivate_artifact(tool.id).await.unwrap());

  assert!(s.list_artifacts(true).await.unwrap().is_empty());
  let all = s.list_artifacts(false).await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(!all[0].is_active);
  assert_eq!(all[0].template, tool.template);
}

#[tokio::test]
async fn artifact_usage_is_counted() {
  let s = store().await;
  let tool = s.insert_artifact(artifact("preset_search", None)).await.unwrap();

  s.record_artifact_usage(tool.id, true, Utc::now()).await.unwrap();
  s.record_artifact_usage(tool.id, false, Utc::now()).await.unwrap();

  let stored = s.get_artifact(tool.id).await.unwrap().unwrap();
  assert_eq!(stored.usage_count, 2);
  assert_eq!(stored.success_count, 1);
  assert!(stored.last_used_at.is_some());
}

// ─── Rules ───────────────────────────────────────────────────────────────────

fn rule(id: &str, scope: Scope) -> NewValidationRule {
  let mut input = NewValidationRule::new(scope, "style", r"console\.log", "no logging");
  input.rule_id = Some(id.into());
  match scope {
    Scope::Project => input.for_project("/p/one").for_client("acme"),
    Scope::Client => input.for_client("acme"),
    _ => input,
  }
}

#[tokio::test]
async fn create_and_get_rule() {
  let s = store().await;
  let created = s.create_rule(rule("r1", Scope::Project)).await.unwrap();
  assert!(created.is_active);
  assert_eq!(created.scope_changed_at, created.created_at);

  let fetched = s.get_rule("r1").await.unwrap().unwrap();
  assert_eq!(fetched.scope, Scope::Project);
  assert_eq!(fetched.project_path.as_deref(), Some("/p/one"));
  assert_eq!(fetched.priority, Priority::Medium);
}

#[tokio::test]
async fn create_rule_generates_id() {
  let s = store().await;
  let created = s
    .create_rule(NewValidationRule::new(Scope::Global, "style", "x", "y"))
    .await
    .unwrap();
  assert!(created.rule_id.starts_with("rule-"));
}

#[tokio::test]
async fn create_duplicate_rule_fails() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Global)).await.unwrap();
  let err = s.create_rule(rule("r1", Scope::Global)).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateRule(id) if id == "r1"));
}

#[tokio::test]
async fn rules_for_scope_respects_visibility() {
  let s = store().await;
  s.create_rule(rule("project", Scope::Project)).await.unwrap();
  s.create_rule(rule("client", Scope::Client)).await.unwrap();
  s.create_rule(rule("global", Scope::Global)).await.unwrap();

  let anonymous = s.rules_for_scope(&RuleQuery::default()).await.unwrap();
  let ids: Vec<&str> = anonymous.iter().map(|r| r.rule_id.as_str()).collect();
  assert_eq!(ids, vec!["global"]);

  let query = RuleQuery {
    client_name: Some("acme".into()),
    project_path: Some("/p/one".into()),
    ..RuleQuery::default()
  };
  assert_eq!(s.rules_for_scope(&query).await.unwrap().len(), 3);

  let other_client = RuleQuery {
    client_name: Some("globex".into()),
    project_path: Some("/p/one".into()),
    ..RuleQuery::default()
  };
  let ids: Vec<String> = s
    .rules_for_scope(&other_client)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.rule_id)
    .collect();
  assert_eq!(ids, vec!["global".to_owned(), "project".to_owned()]);
}

#[tokio::test]
async fn rules_for_scope_filters_scopes_and_technology() {
  let s = store().await;
  s.create_rule(rule("any", Scope::Global)).await.unwrap();
  s.create_rule(rule("rust", Scope::Global).with_technology("rust"))
    .await
    .unwrap();
  s.create_rule(rule("go", Scope::Organization).with_technology("go"))
    .await
    .unwrap();

  let rust = RuleQuery { technology: Some("rust".into()), ..RuleQuery::default() };
  let mut ids: Vec<String> = s
    .rules_for_scope(&rust)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.rule_id)
    .collect();
  ids.sort();
  assert_eq!(ids, vec!["any".to_owned(), "rust".to_owned()]);

  let org_only = RuleQuery { scopes: vec![Scope::Organization], ..RuleQuery::default() };
  let rules = s.rules_for_scope(&org_only).await.unwrap();
  assert_eq!(rules.len(), 1);
  assert_eq!(rules[0].rule_id, "go");
}

#[tokio::test]
async fn rules_for_scope_orders_by_priority_then_confidence() {
  let s = store().await;
  let mut low = rule("low", Scope::Global);
  low.priority = Priority::Low;
  low.confidence = 0.9;
  let mut high_weak = rule("high-weak", Scope::Global);
  high_weak.priority = Priority::High;
  high_weak.confidence = 0.3;
  let mut high_strong = rule("high-strong", Scope::Global);
  high_strong.priority = Priority::High;
  high_strong.confidence = 0.8;
  for input in [low, high_weak, high_strong] {
    s.create_rule(input).await.unwrap();
  }

  let ids: Vec<String> = s
    .rules_for_scope(&RuleQuery::default())
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.rule_id)
    .collect();
  assert_eq!(ids, vec!["high-strong", "high-weak", "low"]);
}

#[tokio::test]
async fn promote_rule_is_conditional() {
  let s = store().await;
  s.create_rule(NewValidationRule {
    rule_id: Some("r1".into()),
    ..NewValidationRule::new(Scope::Project, "style", "x", "y").for_project("/p")
  })
  .await
  .unwrap();

  let at = Utc::now();
  assert!(
    s.promote_rule("r1", Scope::Project, Scope::Client, Some("acme".into()), at)
      .await
      .unwrap()
  );
  // Stale `from` scope: no-op.
  assert!(
    !s.promote_rule("r1", Scope::Project, Scope::Client, None, at)
      .await
      .unwrap()
  );

  let promoted = s.get_rule("r1").await.unwrap().unwrap();
  assert_eq!(promoted.scope, Scope::Client);
  assert_eq!(promoted.client_name.as_deref(), Some("acme"));
  assert!(promoted.scope_changed_at >= promoted.created_at);
}

#[tokio::test]
async fn promote_rule_keeps_existing_client() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Project)).await.unwrap();
  s.promote_rule("r1", Scope::Project, Scope::Client, Some("globex".into()), Utc::now())
    .await
    .unwrap();
  let promoted = s.get_rule("r1").await.unwrap().unwrap();
  assert_eq!(promoted.client_name.as_deref(), Some("acme"));
}

#[tokio::test]
async fn deactivated_rules_are_hidden_and_frozen() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Client)).await.unwrap();

  assert!(s.deactivate_rule("r1").await.unwrap());
  assert!(!s.deactivate_rule("r1").await.unwrap());
  assert!(
    !s.promote_rule("r1", Scope::Client, Scope::Organization, None, Utc::now())
      .await
      .unwrap()
  );
  assert!(s.active_rules().await.unwrap().is_empty());

  let stored = s.get_rule("r1").await.unwrap().unwrap();
  assert!(!stored.is_active);
  assert_eq!(stored.scope, Scope::Client);
}

#[tokio::test]
async fn rule_confidence_updates_are_clamped() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Global)).await.unwrap();

  assert!(s.set_rule_confidence("r1", 1.7).await.unwrap());
  assert!((s.get_rule("r1").await.unwrap().unwrap().confidence - 1.0).abs() < 1e-9);

  assert!(s.update_rule_pattern("r1", r"\bx\b".into(), 0.4).await.unwrap());
  let stored = s.get_rule("r1").await.unwrap().unwrap();
  assert_eq!(stored.pattern, r"\bx\b");
  assert!((stored.confidence - 0.4).abs() < 1e-9);

  assert!(!s.set_rule_effectiveness("missing", 0.5).await.unwrap());
}

// ─── Applications ────────────────────────────────────────────────────────────

fn application(rule_id: &str, project: &str, client: &str, success: bool) -> NewRuleApplication {
  NewRuleApplication {
    rule_id: rule_id.into(),
    project_path: Some(project.into()),
    client_name: Some(client.into()),
    success,
    execution_time_ms: Some(10),
    ..NewRuleApplication::default()
  }
}

#[tokio::test]
async fn record_application_for_missing_rule_fails() {
  let s = store().await;
  let err = s
    .record_application(application("ghost", "/p", "acme", true))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RuleNotFound(id) if id == "ghost"));
}

#[tokio::test]
async fn application_stats_aggregate() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Project)).await.unwrap();
  let since = Utc::now() - Duration::minutes(1);

  s.record_application(application("r1", "/p/one", "acme", true)).await.unwrap();
  s.record_application(application("r1", "/p/two", "acme", true)).await.unwrap();
  s.record_application(application("r1", "/p/two", "globex", false)).await.unwrap();
  s.record_application(NewRuleApplication {
    false_positive: true,
    ..application("r1", "/p/one", "acme", false)
  })
  .await
  .unwrap();

  let stats = s.application_stats("r1", since).await.unwrap();
  assert_eq!(stats.applications, 4);
  assert_eq!(stats.successes, 2);
  assert_eq!(stats.false_positives, 1);
  assert_eq!(stats.distinct_projects, 2);
  assert_eq!(stats.distinct_clients, 2);
  assert_eq!(stats.total_execution_ms, 40);
  assert_eq!(stats.top_client.as_deref(), Some("acme"));
  assert!((stats.success_rate() - 0.5).abs() < 1e-9);
  assert!((stats.avg_execution_ms() - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn application_stats_empty_window() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Global)).await.unwrap();
  let stats = s.application_stats("r1", Utc::now()).await.unwrap();
  assert_eq!(stats.applications, 0);
  assert_eq!(stats.success_rate(), 0.0);
  assert!(stats.top_client.is_none());
}

#[tokio::test]
async fn promotion_candidates_count_from_scope_change() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Project)).await.unwrap();
  s.create_rule(rule("g1", Scope::Global)).await.unwrap();
  let since = Utc::now() - Duration::days(7);

  for _ in 0..5 {
    s.record_application(application("r1", "/p/one", "acme", true)).await.unwrap();
    s.record_application(application("g1", "/p/one", "acme", true)).await.unwrap();
  }

  let candidates = s.promotion_candidates(since, 5).await.unwrap();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].rule.rule_id, "r1");
  assert_eq!(candidates[0].stats.applications, 5);
  assert_eq!(candidates[0].stats.top_client.as_deref(), Some("acme"));

  // After promotion the same evidence no longer counts.
  tokio::time::sleep(std::time::Duration::from_millis(2)).await;
  s.promote_rule("r1", Scope::Project, Scope::Client, None, Utc::now())
    .await
    .unwrap();
  assert!(s.promotion_candidates(since, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivation_candidates_include_all_scopes() {
  let s = store().await;
  s.create_rule(rule("g1", Scope::Global)).await.unwrap();
  s.create_rule(rule("quiet", Scope::Global)).await.unwrap();
  let since = Utc::now() - Duration::days(30);

  for _ in 0..3 {
    s.record_application(application("g1", "/p", "acme", false)).await.unwrap();
  }
  s.record_application(application("quiet", "/p", "acme", false)).await.unwrap();

  let candidates = s.deactivation_candidates(since, 3).await.unwrap();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].rule.rule_id, "g1");
  assert_eq!(candidates[0].stats.successes, 0);
}

#[tokio::test]
async fn pending_feedback_is_consumed_once() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Global)).await.unwrap();
  let since = Utc::now() - Duration::hours(24);

  let with_feedback = s
    .record_application(NewRuleApplication {
      feedback: Some("too broad".into()),
      ..application("r1", "/p", "acme", false)
    })
    .await
    .unwrap();
  // Successful applications never count as feedback.
  s.record_application(NewRuleApplication {
    feedback: Some("great".into()),
    ..application("r1", "/p", "acme", true)
  })
  .await
  .unwrap();
  s.record_application(application("r1", "/p", "acme", false)).await.unwrap();

  let pending = s.pending_feedback(since).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].id, with_feedback.id);

  s.mark_feedback_processed(with_feedback.id).await.unwrap();
  s.mark_feedback_processed(with_feedback.id).await.unwrap();
  assert!(s.pending_feedback(since).await.unwrap().is_empty());
}

#[tokio::test]
async fn applications_for_rule_in_order() {
  let s = store().await;
  s.create_rule(rule("r1", Scope::Global)).await.unwrap();
  let first = s.record_application(application("r1", "/p", "acme", true)).await.unwrap();
  let second = s.record_application(application("r1", "/p", "acme", false)).await.unwrap();

  let apps = s.applications_for_rule("r1").await.unwrap();
  let ids: Vec<Uuid> = apps.iter().map(|a| a.id).collect();
  assert_eq!(ids, vec![first.id, second.id]);
}

// ─── Knowledge ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn knowledge_is_newest_first_and_filterable() {
  let s = store().await;
  s.record_knowledge(
    NewKnowledgeEntry::new(EntryType::SystemActivity, "mined", json!({ "n": 1 }))
      .tagged(["mining"]),
  )
  .await
  .unwrap();
  s.record_knowledge(NewKnowledgeEntry::new(
    EntryType::RulePromotion,
    "promoted r1",
    json!({ "rule_id": "r1" }),
  ))
  .await
  .unwrap();

  let all = s.list_knowledge(None, 10).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].title, "promoted r1");
  assert_eq!(all[1].tags, vec!["mining".to_owned()]);

  let promotions = s
    .list_knowledge(Some(EntryType::RulePromotion), 10)
    .await
    .unwrap();
  assert_eq!(promotions.len(), 1);
  assert_eq!(promotions[0].content["rule_id"], json!("r1"));

  assert_eq!(s.list_knowledge(None, 1).await.unwrap().len(), 1);
}

// ─── Leases ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lease_excludes_other_holders() {
  let s = store().await;
  let ttl = Duration::minutes(5);

  assert!(s.try_acquire_lease("cycle", "a", ttl).await.unwrap());
  assert!(!s.try_acquire_lease("cycle", "b", ttl).await.unwrap());
  // Not re-entrant, even for the holder.
  assert!(!s.try_acquire_lease("cycle", "a", ttl).await.unwrap());

  // Only the holder can release.
  s.release_lease("cycle", "b").await.unwrap();
  assert!(!s.try_acquire_lease("cycle", "b", ttl).await.unwrap());

  s.release_lease("cycle", "a").await.unwrap();
  assert!(s.try_acquire_lease("cycle", "b", ttl).await.unwrap());
}

#[tokio::test]
async fn expired_lease_can_be_taken() {
  let s = store().await;
  assert!(
    s.try_acquire_lease("mining", "a", Duration::zero())
      .await
      .unwrap()
  );
  assert!(
    s.try_acquire_lease("mining", "b", Duration::minutes(1))
      .await
      .unwrap()
  );
}
