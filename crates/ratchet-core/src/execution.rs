//! Tool executions: the raw evidence the pattern miner reads.
//!
//! Rows are written by the execution pipeline: created when an invocation
//! starts and completed exactly once when it ends. The learning core only
//! reads them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An order-irrelevant key/value parameter bag.
pub type Params = BTreeMap<String, serde_json::Value>;

/// One recorded tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
  pub id:                Uuid,
  pub tool_name:         String,
  pub parameters:        Params,
  pub result:            Option<serde_json::Value>,
  pub success:           bool,
  pub error_message:     Option<String>,
  pub execution_time_ms: Option<u64>,
  pub session_id:        Option<String>,
  /// Server-assigned; the miner orders executions by this column.
  pub created_at:        DateTime<Utc>,
  /// `None` while the invocation is still running.
  pub completed_at:      Option<DateTime<Utc>>,
}

impl ToolExecution {
  pub fn is_completed(&self) -> bool { self.completed_at.is_some() }
}

/// Input to [`crate::store::LearningStore::record_execution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewToolExecution {
  pub tool_name:  String,
  #[serde(default)]
  pub parameters: Params,
  pub session_id: Option<String>,
}

impl NewToolExecution {
  pub fn new(tool_name: impl Into<String>, parameters: Params) -> Self {
    Self { tool_name: tool_name.into(), parameters, session_id: None }
  }

  pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
    self.session_id = Some(session_id.into());
    self
  }
}

/// How an invocation ended. Applied once by
/// [`crate::store::LearningStore::complete_execution`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
  pub success:           bool,
  pub result:            Option<serde_json::Value>,
  pub error_message:     Option<String>,
  pub execution_time_ms: Option<u64>,
}

impl ExecutionOutcome {
  pub fn succeeded(result: Option<serde_json::Value>) -> Self {
    Self { success: true, result, ..Self::default() }
  }

  pub fn failed(error: impl Into<String>) -> Self {
    Self { success: false, error_message: Some(error.into()), ..Self::default() }
  }
}
