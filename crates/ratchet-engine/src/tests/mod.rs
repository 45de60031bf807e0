//! Engine tests against an in-memory `SqliteStore`.

mod artifacts;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ratchet_core::{
  Scope,
  config::{LearningConfig, PropagationConfig},
  execution::{ExecutionOutcome, NewToolExecution, Params, ToolExecution},
  rule::{NewRuleApplication, NewValidationRule, ValidationRule},
  store::LearningStore,
};
use ratchet_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::LearningEngine;

async fn engine() -> LearningEngine<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  LearningEngine::new(
    Arc::new(store),
    LearningConfig::default(),
    PropagationConfig::default(),
  )
}

fn params(value: Value) -> Params {
  serde_json::from_value(value).expect("object params")
}

fn exec(tool: &str, p: Value, success: bool, at: DateTime<Utc>) -> ToolExecution {
  ToolExecution {
    id:                Uuid::new_v4(),
    tool_name:         tool.into(),
    parameters:        params(p),
    result:            None,
    success,
    error_message:     None,
    execution_time_ms: None,
    session_id:        None,
    created_at:        at,
    completed_at:      Some(at),
  }
}

/// Executions one second apart, starting at a fixed instant.
fn timeline(calls: &[(&str, bool)]) -> Vec<ToolExecution> {
  let start = Utc::now() - Duration::hours(1);
  calls
    .iter()
    .enumerate()
    .map(|(i, (tool, ok))| exec(tool, json!({}), *ok, start + Duration::seconds(i as i64)))
    .collect()
}

/// Record and complete one execution.
async fn execute(
  engine: &LearningEngine<SqliteStore>,
  tool: &str,
  p: Value,
  success: bool,
) {
  let exec = engine
    .store()
    .record_execution(NewToolExecution::new(tool, params(p)))
    .await
    .unwrap();
  let outcome = if success {
    ExecutionOutcome::succeeded(Some(json!({ "ok": true })))
  } else {
    ExecutionOutcome::failed("boom")
  };
  engine
    .store()
    .complete_execution(exec.id, outcome)
    .await
    .unwrap();
}

/// Run each step once, in order, successfully.
async fn run_sequence(engine: &LearningEngine<SqliteStore>, steps: &[(&str, Value)]) {
  for (tool, p) in steps {
    execute(engine, tool, p.clone(), true).await;
  }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

async fn project_rule(
  engine: &LearningEngine<SqliteStore>,
  id: &str,
  client: Option<&str>,
) -> ValidationRule {
  let mut input =
    NewValidationRule::new(Scope::Project, "security", r"eval\(", "avoid eval")
      .for_project("/srv/a");
  input.rule_id = Some(id.into());
  input.client_name = client.map(str::to_owned);
  engine.rules().create_rule(input).await.unwrap()
}

fn application(rule_id: &str, project: &str, client: &str, success: bool) -> NewRuleApplication {
  NewRuleApplication {
    rule_id: rule_id.into(),
    project_path: Some(project.into()),
    client_name: Some(client.into()),
    success,
    ..NewRuleApplication::default()
  }
}

/// Record `n` applications through the tracker, cycling over `sites`.
async fn apply_n(
  engine: &LearningEngine<SqliteStore>,
  rule_id: &str,
  n: usize,
  sites: &[(&str, &str)],
  success: bool,
) {
  for i in 0..n {
    let (project, client) = sites[i % sites.len()];
    engine
      .tracker()
      .record(application(rule_id, project, client, success))
      .await
      .unwrap();
  }
}
