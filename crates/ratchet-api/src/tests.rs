//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::Duration;
use ratchet_core::{
  config::{LearningConfig, PropagationConfig},
  store::LearningStore,
};
use ratchet_engine::{LearningEngine, engine::PROPAGATION_LEASE};
use ratchet_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{ApiState, MiningTrigger, api_router};

async fn state() -> ApiState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let engine = LearningEngine::new(
    Arc::new(store),
    LearningConfig::default(),
    PropagationConfig::default(),
  );
  ApiState::new(Arc::new(engine))
}

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = router.oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

/// Start and complete one successful execution; returns its id.
async fn execute(state: &ApiState<SqliteStore>, tool: &str) -> String {
  let (status, started) = send(
    api_router(state.clone()),
    "POST",
    "/executions",
    Some(json!({ "tool_name": tool, "parameters": {} })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = started["id"].as_str().unwrap().to_owned();

  let (status, _) = send(
    api_router(state.clone()),
    "POST",
    &format!("/executions/{id}/complete"),
    Some(json!({ "success": true })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  id
}

// ─── Executions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn execution_completes_exactly_once() {
  let state = state().await;
  let id = execute(&state, "read").await;

  let (status, body) = send(
    api_router(state.clone()),
    "POST",
    &format!("/executions/{id}/complete"),
    Some(json!({ "success": false, "error_message": "late" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("already completed"));

  let (status, _) = send(
    api_router(state.clone()),
    "POST",
    "/executions/00000000-0000-0000-0000-000000000000/complete",
    Some(json!({ "success": true })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_tool_name_is_rejected() {
  let state = state().await;
  let (status, _) = send(
    api_router(state),
    "POST",
    "/executions",
    Some(json!({ "tool_name": "  " })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completions_feed_the_trigger() {
  let trigger = Arc::new(MiningTrigger::new(2));
  let state = state().await.with_trigger(trigger.clone());
  execute(&state, "read").await;
  execute(&state, "write").await;
  assert_eq!(trigger.completed(), 2);
}

// ─── Mining, patterns, artifacts ─────────────────────────────────────────────

#[tokio::test]
async fn mining_run_generates_browsable_artifacts() {
  let state = state().await;
  for _ in 0..3 {
    execute(&state, "read").await;
    execute(&state, "write").await;
  }

  let (status, report) = send(api_router(state.clone()), "POST", "/mining/run", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["executions_scanned"], json!(6));
  assert_eq!(report["generated"].as_array().unwrap().len(), 1);

  let (status, patterns) =
    send(api_router(state.clone()), "GET", "/patterns?kind=sequence", None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(!patterns.as_array().unwrap().is_empty());

  // read:{}->write:{}
  let (status, pattern) = send(
    api_router(state.clone()),
    "GET",
    "/patterns/read%3A%7B%7D-%3Ewrite%3A%7B%7D",
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(pattern["occurrences"], json!(3));
  let tool_id = pattern["tool_id"].as_str().unwrap().to_owned();

  let (status, artifact) = send(
    api_router(state.clone()),
    "POST",
    &format!("/artifacts/{tool_id}/deactivate"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(artifact["is_active"], json!(false));

  let (_, active) =
    send(api_router(state.clone()), "GET", "/artifacts?active_only=true", None).await;
  assert!(active.as_array().unwrap().is_empty());
  let (_, all) = send(api_router(state.clone()), "GET", "/artifacts", None).await;
  assert_eq!(all.as_array().unwrap().len(), 1);

  let (status, _) = send(api_router(state), "GET", "/patterns/unknown", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Rules ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rule_authoring_and_scoped_reads() {
  let state = state().await;
  let rule = json!({
    "rule_id":     "no-var",
    "scope":       "client",
    "category":    "style",
    "pattern":     "var ",
    "message":     "use let",
    "client_name": "acme",
  });

  let (status, created) =
    send(api_router(state.clone()), "POST", "/rules", Some(rule.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["is_active"], json!(true));
  assert_eq!(created["confidence"], json!(0.5));

  let (status, _) = send(api_router(state.clone()), "POST", "/rules", Some(rule)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = send(
    api_router(state.clone()),
    "POST",
    "/rules",
    Some(json!({ "scope": "client", "category": "style", "pattern": "x", "message": "m" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, acme) = send(api_router(state.clone()), "GET", "/rules?client=acme", None).await;
  assert_eq!(acme.as_array().unwrap().len(), 1);
  let (_, globex) = send(api_router(state.clone()), "GET", "/rules?client=globex", None).await;
  assert!(globex.as_array().unwrap().is_empty());

  let (status, _) = send(api_router(state.clone()), "GET", "/rules?scopes=galaxy", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(api_router(state.clone()), "GET", "/rules/no-var", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = send(api_router(state), "GET", "/rules/ghost", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn applications_are_recorded_and_listed() {
  let state = state().await;
  send(
    api_router(state.clone()),
    "POST",
    "/rules",
    Some(json!({
      "rule_id":  "no-eval",
      "scope":    "global",
      "category": "security",
      "pattern":  "eval\\(",
      "message":  "avoid eval",
    })),
  )
  .await;

  let (status, _) = send(
    api_router(state.clone()),
    "POST",
    "/applications",
    Some(json!({ "rule_id": "no-eval", "project_path": "/srv/a", "success": true })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) = send(
    api_router(state.clone()),
    "POST",
    "/applications",
    Some(json!({ "rule_id": "ghost", "success": true })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, history) =
    send(api_router(state.clone()), "GET", "/rules/no-eval/applications", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(history.as_array().unwrap().len(), 1);

  let (_, rule) = send(api_router(state), "GET", "/rules/no-eval", None).await;
  assert!(rule["effectiveness_score"].as_f64().unwrap() > 0.0);
}

// ─── Propagation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn propagation_run_respects_the_lease() {
  let state = state().await;

  let (status, report) = send(api_router(state.clone()), "POST", "/propagation/run", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["promoted"], json!([]));

  let (_, entries) = send(
    api_router(state.clone()),
    "GET",
    "/knowledge?entry_type=system_activity&limit=5",
    None,
  )
  .await;
  assert_eq!(entries.as_array().unwrap().len(), 1);

  let store = state.engine.store();
  assert!(
    store
      .try_acquire_lease(PROPAGATION_LEASE, "elsewhere", Duration::minutes(5))
      .await
      .unwrap()
  );
  let (status, _) = send(api_router(state), "POST", "/propagation/run", None).await;
  assert_eq!(status, StatusCode::CONFLICT);
}
