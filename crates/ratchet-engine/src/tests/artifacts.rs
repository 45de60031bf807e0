use std::sync::Mutex;

use chrono::Utc;
use ratchet_core::artifact::{ArtifactTemplate, TemplateStep};
use uuid::Uuid;

use super::*;
use crate::{Error, ToolInvoker, runner::run_artifact};

/// Echoes its parameters back, failing for one tool name.
#[derive(Default)]
struct Echo {
  fail_on: Option<&'static str>,
  calls:   Mutex<Vec<(String, Params)>>,
}

impl Echo {
  fn failing_on(tool: &'static str) -> Self {
    Self { fail_on: Some(tool), ..Self::default() }
  }

  fn calls(&self) -> Vec<(String, Params)> { self.calls.lock().unwrap().clone() }
}

impl ToolInvoker for Echo {
  async fn invoke(&self, tool_name: &str, parameters: Params) -> Result<Value, String> {
    self
      .calls
      .lock()
      .unwrap()
      .push((tool_name.to_owned(), parameters.clone()));
    if self.fail_on == Some(tool_name) {
      return Err(format!("{tool_name} is unavailable"));
    }
    Ok(serde_json::to_value(parameters).unwrap())
  }
}

fn step(tool: &str, p: Value) -> TemplateStep {
  TemplateStep { tool_name: tool.into(), parameters: params(p) }
}

#[tokio::test]
async fn failing_step_does_not_abort_the_sequence() {
  let template = ArtifactTemplate::Sequence {
    name:        "lint_fix_workflow_0a1b2c3d".into(),
    description: "lint then fix".into(),
    steps:       vec![
      step("lint", json!({ "path": "src" })),
      step("fix", json!({ "path": "src" })),
      step("report", json!({ "format": "short" })),
    ],
  };
  let invoker = Echo::failing_on("fix");

  let outcome = run_artifact(&template, &params(json!({ "path": "lib" })), &invoker).await;
  assert!(!outcome.success);
  assert_eq!(outcome.results.len(), 2);
  assert_eq!(outcome.errors.len(), 1);
  assert_eq!(outcome.errors[0].step, 1);
  assert_eq!(outcome.errors[0].tool_name, "fix");
  assert_eq!(outcome.summary, "lint_fix_workflow_0a1b2c3d: 2/3 step(s) succeeded");

  // Overrides win over captured parameters, and reach every step.
  let calls = invoker.calls();
  assert_eq!(calls.len(), 3);
  assert_eq!(calls[0].1, params(json!({ "path": "lib" })));
  assert_eq!(calls[2].1, params(json!({ "format": "short", "path": "lib" })));
}

#[tokio::test]
async fn preset_merges_under_overrides() {
  let template = ArtifactTemplate::Preset {
    name:        "search_preset_deadbeef".into(),
    description: "search with fixed paging".into(),
    base_tool:   "search".into(),
    preset:      params(json!({ "limit": 10, "sort": "asc" })),
  };
  let invoker = Echo::default();

  let outcome = run_artifact(
    &template,
    &params(json!({ "limit": 5, "query": "rust" })),
    &invoker,
  )
  .await;
  assert!(outcome.success);
  assert_eq!(
    outcome.results[0].output,
    json!({ "limit": 5, "query": "rust", "sort": "asc" })
  );
  assert_eq!(invoker.calls()[0].0, "search");
}

#[tokio::test]
async fn running_a_stored_artifact_records_usage() {
  let e = engine().await;
  for _ in 0..3 {
    run_sequence(&e, &[("lint", json!({})), ("fix", json!({}))]).await;
  }
  let report = e.mine_once(Utc::now()).await.unwrap();
  let tool_id = report.generated[0];

  let outcome = e
    .run_artifact(tool_id, &Params::new(), &Echo::default())
    .await
    .unwrap();
  assert!(outcome.success);
  e.run_artifact(tool_id, &Params::new(), &Echo::failing_on("fix"))
    .await
    .unwrap();

  let artifact = e.store().get_artifact(tool_id).await.unwrap().unwrap();
  assert_eq!(artifact.usage_count, 2);
  assert_eq!(artifact.success_count, 1);
  assert!(artifact.last_used_at.is_some());
}

#[tokio::test]
async fn inactive_and_unknown_artifacts_are_refused() {
  let e = engine().await;
  for _ in 0..3 {
    run_sequence(&e, &[("lint", json!({})), ("fix", json!({}))]).await;
  }
  let tool_id = e.mine_once(Utc::now()).await.unwrap().generated[0];
  assert!(e.store().deactivate_artifact(tool_id).await.unwrap());

  let err = e
    .run_artifact(tool_id, &Params::new(), &Echo::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ArtifactInactive(id) if id == tool_id));

  let missing = Uuid::new_v4();
  let err = e
    .run_artifact(missing, &Params::new(), &Echo::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ArtifactNotFound(id) if id == missing));

  // History survives deactivation.
  let all = e.store().list_artifacts(false).await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(e.store().list_artifacts(true).await.unwrap().is_empty());
}
