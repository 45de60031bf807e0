//! Reference interpreter for artifact templates.
//!
//! The learning core never dispatches tools itself; callers supply a
//! [`ToolInvoker`] that does. A failing step is recorded and the run moves
//! on to the next one.

use std::future::Future;

use ratchet_core::{artifact::ArtifactTemplate, execution::Params};
use serde::Serialize;

/// Dispatches one tool call on behalf of a running artifact.
pub trait ToolInvoker: Send + Sync {
  fn invoke<'a>(
    &'a self,
    tool_name: &'a str,
    parameters: Params,
  ) -> impl Future<Output = Result<serde_json::Value, String>> + Send + 'a;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
  pub step:      usize,
  pub tool_name: String,
  pub output:    serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepError {
  pub step:      usize,
  pub tool_name: String,
  pub message:   String,
}

/// Aggregate result of one artifact run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactOutcome {
  /// `true` iff no step failed.
  pub success: bool,
  pub results: Vec<StepResult>,
  pub errors:  Vec<StepError>,
  pub summary: String,
}

/// Layer `overrides` over `base`; override keys win.
pub fn merge_params(base: &Params, overrides: &Params) -> Params {
  let mut merged = base.clone();
  merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
  merged
}

/// Run `template` with caller `overrides` through `invoker`.
pub async fn run_artifact<I: ToolInvoker>(
  template: &ArtifactTemplate,
  overrides: &Params,
  invoker: &I,
) -> ArtifactOutcome {
  let calls: Vec<(&str, Params)> = match template {
    ArtifactTemplate::Sequence { steps, .. } => steps
      .iter()
      .map(|s| (s.tool_name.as_str(), merge_params(&s.parameters, overrides)))
      .collect(),
    ArtifactTemplate::Preset { base_tool, preset, .. } => {
      vec![(base_tool.as_str(), merge_params(preset, overrides))]
    }
  };

  let total = calls.len();
  let mut results = Vec::new();
  let mut errors = Vec::new();
  for (step, (tool_name, parameters)) in calls.into_iter().enumerate() {
    match invoker.invoke(tool_name, parameters).await {
      Ok(output) => results.push(StepResult {
        step,
        tool_name: tool_name.to_owned(),
        output,
      }),
      Err(message) => {
        tracing::debug!(step, tool = tool_name, %message, "artifact step failed");
        errors.push(StepError { step, tool_name: tool_name.to_owned(), message });
      }
    }
  }

  let summary = format!(
    "{}: {}/{total} step(s) succeeded",
    template.name(),
    results.len()
  );
  ArtifactOutcome { success: errors.is_empty(), results, errors, summary }
}
