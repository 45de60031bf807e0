//! [`SqliteStore`]: the SQLite implementation of [`LearningStore`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use ratchet_core::{
  Scope,
  artifact::{GeneratedTool, NewGeneratedTool},
  execution::{ExecutionOutcome, NewToolExecution, ToolExecution},
  knowledge::{EntryType, KnowledgeEntry, NewKnowledgeEntry},
  pattern::{LearnedPattern, PatternCandidate, PatternKind},
  rule::{
    ApplicationStats, NewRuleApplication, NewValidationRule, RuleApplication,
    RuleEvidence, RuleQuery, ValidationRule,
  },
  store::LearningStore,
};

use crate::{
  Error, Result,
  encode::{
    APPLICATION_COLUMNS, ARTIFACT_COLUMNS, EXECUTION_COLUMNS, KNOWLEDGE_COLUMNS,
    PATTERN_COLUMNS, RULE_COLUMN_COUNT, RULE_COLUMNS, RULE_COLUMNS_R,
    RawApplication, RawArtifact, RawExecution, RawKnowledge, RawPattern,
    RawRule, RawStats, encode_dt, encode_uuid, now,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ratchet store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Rule plus aggregate columns, decoded outside the connection thread.
type RawEvidence = (RawRule, RawStats, Option<String>);

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the connection, bypassing every encoder.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
    Ok(self.conn.call(move |conn| Ok(conn.execute(sql, [])?)).await?)
  }

  async fn fetch_executions(
    &self,
    sql: String,
    args: Vec<Value>,
  ) -> Result<Vec<RawExecution>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(args), RawExecution::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn fetch_patterns(
    &self,
    sql: String,
    args: Vec<Value>,
  ) -> Result<Vec<LearnedPattern>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawPattern::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPattern::into_pattern).collect()
  }

  async fn fetch_artifacts(
    &self,
    sql: String,
    args: Vec<Value>,
  ) -> Result<Vec<GeneratedTool>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawArtifact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  async fn fetch_rules(
    &self,
    sql: String,
    args: Vec<Value>,
  ) -> Result<Vec<ValidationRule>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawRule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRule::into_rule).collect()
  }

  async fn fetch_applications(
    &self,
    sql: String,
    args: Vec<Value>,
  ) -> Result<Vec<RuleApplication>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawApplication::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawApplication::into_application).collect()
  }

  /// Run an evidence query whose rows are `RULE_COLUMNS_R` followed by the
  /// seven aggregate columns of [`RawStats`]. With `from_scope_change`, the
  /// top-client lookup counts from the later of `since` and the rule's last
  /// scope change, matching the join in the query.
  async fn fetch_evidence(
    &self,
    sql: String,
    since: String,
    min_applications: u64,
    from_scope_change: bool,
  ) -> Result<Vec<RuleEvidence>> {
    let min = i64::try_from(min_applications).unwrap_or(i64::MAX);

    let raws: Vec<RawEvidence> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![since, min], |row| {
            Ok((
              RawRule::from_row(row)?,
              RawStats::from_row(row, RULE_COLUMN_COUNT)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (rule, stats) in rows {
          let bound = if from_scope_change && rule.scope_changed_at > since {
            rule.scope_changed_at.clone()
          } else {
            since.clone()
          };
          let top = top_client(conn, &rule.rule_id, &bound)?;
          out.push((rule, stats, top));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(rule, stats, top)| {
        Ok(RuleEvidence { rule: rule.into_rule()?, stats: stats.into_stats(top) })
      })
      .collect()
  }

  async fn update_rule(
    &self,
    sql: &'static str,
    rule_id: &str,
    value: Value,
  ) -> Result<bool> {
    let rule_id = rule_id.to_owned();
    let at_str = encode_dt(now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(sql, rusqlite::params![rule_id, value, at_str])?)
      })
      .await?;
    Ok(changed == 1)
  }
}

/// The client with the most applications of `rule_id` since `since`.
fn top_client(
  conn: &rusqlite::Connection,
  rule_id: &str,
  since: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT client_name FROM rule_applications
       WHERE rule_id = ?1 AND applied_at >= ?2 AND client_name IS NOT NULL
       GROUP BY client_name
       ORDER BY COUNT(*) DESC, client_name
       LIMIT 1",
      rusqlite::params![rule_id, since],
      |r| r.get(0),
    )
    .optional()
}

fn sql_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn sql_u64(n: Option<u64>) -> Option<i64> {
  n.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

// ─── LearningStore impl ──────────────────────────────────────────────────────

impl LearningStore for SqliteStore {
  type Error = Error;

  // ── Executions ────────────────────────────────────────────────────────────

  async fn record_execution(
    &self,
    input: NewToolExecution,
  ) -> Result<ToolExecution> {
    let execution = ToolExecution {
      id:                Uuid::new_v4(),
      tool_name:         input.tool_name,
      parameters:        input.parameters,
      result:            None,
      success:           false,
      error_message:     None,
      execution_time_ms: None,
      session_id:        input.session_id,
      created_at:        now(),
      completed_at:      None,
    };

    let id_str     = encode_uuid(execution.id);
    let tool_name  = execution.tool_name.clone();
    let params_str = serde_json::to_string(&execution.parameters)?;
    let session_id = execution.session_id.clone();
    let at_str     = encode_dt(execution.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tool_executions (id, tool_name, parameters, session_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, tool_name, params_str, session_id, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(execution)
  }

  async fn complete_execution(
    &self,
    id: Uuid,
    outcome: ExecutionOutcome,
  ) -> Result<ToolExecution> {
    let id_str     = encode_uuid(id);
    let result_str = outcome
      .result
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let at_str     = encode_dt(now());
    let time_ms    = sql_u64(outcome.execution_time_ms);

    // None: no such row. Some(false): already completed.
    let updated: Option<bool> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE tool_executions
           SET success = ?2, result = ?3, error_message = ?4,
               execution_time_ms = ?5, completed_at = ?6
           WHERE id = ?1 AND completed_at IS NULL",
          rusqlite::params![
            id_str,
            outcome.success,
            result_str,
            outcome.error_message,
            time_ms,
            at_str,
          ],
        )?;
        if changed == 1 {
          return Ok(Some(true));
        }
        let exists = conn
          .query_row(
            "SELECT 1 FROM tool_executions WHERE id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        Ok(exists.then_some(false))
      })
      .await?;

    match updated {
      None => Err(Error::ExecutionNotFound(id)),
      Some(false) => Err(Error::AlreadyCompleted(id)),
      Some(true) => self
        .get_execution(id)
        .await?
        .ok_or(Error::ExecutionNotFound(id)),
    }
  }

  async fn get_execution(&self, id: Uuid) -> Result<Option<ToolExecution>> {
    let raws = self
      .fetch_executions(
        format!("SELECT {EXECUTION_COLUMNS} FROM tool_executions WHERE id = ?1"),
        vec![Value::Text(encode_uuid(id))],
      )
      .await?;
    raws.into_iter().next().map(RawExecution::into_execution).transpose()
  }

  async fn successful_executions_since(
    &self,
    since: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<ToolExecution>> {
    // Newest `limit` rows, then flipped to chronological order.
    let raws = self
      .fetch_executions(
        format!(
          "SELECT {EXECUTION_COLUMNS} FROM tool_executions
           WHERE success = 1 AND completed_at IS NOT NULL AND created_at >= ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ),
        vec![Value::Text(encode_dt(since)), Value::Integer(sql_count(limit))],
      )
      .await?;

    let mut executions: Vec<ToolExecution> = raws
      .into_iter()
      .filter_map(|raw| {
        let id = raw.id.clone();
        match raw.into_execution() {
          Ok(execution) => Some(execution),
          Err(e) => {
            tracing::warn!(execution_id = %id, error = %e, "skipping malformed execution");
            None
          }
        }
      })
      .collect();
    executions.reverse();
    Ok(executions)
  }

  // ── Patterns ──────────────────────────────────────────────────────────────

  async fn get_pattern(&self, signature: &str) -> Result<Option<LearnedPattern>> {
    Ok(
      self
        .fetch_patterns(
          format!(
            "SELECT {PATTERN_COLUMNS} FROM learned_patterns WHERE pattern_signature = ?1"
          ),
          vec![Value::Text(signature.to_owned())],
        )
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn insert_pattern(
    &self,
    candidate: &PatternCandidate,
  ) -> Result<LearnedPattern> {
    let pattern = LearnedPattern {
      id:           Uuid::new_v4(),
      signature:    candidate.signature.clone(),
      kind:         candidate.kind(),
      body:         candidate.body.clone(),
      occurrences:  candidate.occurrences.max(1),
      confidence:   candidate.confidence.clamp(0.0, 1.0),
      suggestion:   Some(candidate.suggestion.clone()),
      tool_id:      None,
      auto_created: false,
      first_seen:   candidate.first_seen,
      last_seen:    candidate.last_seen,
    };

    let id_str         = encode_uuid(pattern.id);
    let signature      = pattern.signature.clone();
    let kind_str       = pattern.kind.as_str();
    let body_str       = serde_json::to_string(&pattern.body)?;
    let occurrences    = i64::from(pattern.occurrences);
    let confidence     = pattern.confidence;
    let suggestion_str = serde_json::to_string(&candidate.suggestion)?;
    let first_str      = encode_dt(pattern.first_seen);
    let last_str       = encode_dt(pattern.last_seen);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO learned_patterns (
             id, pattern_signature, pattern_type, pattern_data, occurrences,
             confidence, tool_suggestion, first_seen, last_seen
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(pattern_signature) DO NOTHING",
          rusqlite::params![
            id_str,
            signature,
            kind_str,
            body_str,
            occurrences,
            confidence,
            suggestion_str,
            first_str,
            last_str,
          ],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::DuplicatePattern(pattern.signature));
    }
    Ok(pattern)
  }

  async fn observe_pattern(
    &self,
    signature: &str,
    confidence_step: f64,
    seen_at: DateTime<Utc>,
  ) -> Result<Option<LearnedPattern>> {
    let sig    = signature.to_owned();
    let at_str = encode_dt(seen_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE learned_patterns
           SET occurrences = occurrences + 1,
               confidence  = MIN(1.0, confidence + ?2),
               last_seen   = MAX(last_seen, ?3)
           WHERE pattern_signature = ?1",
          rusqlite::params![sig, confidence_step, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_pattern(signature).await
  }

  async fn link_artifact(&self, pattern_id: Uuid, tool_id: Uuid) -> Result<bool> {
    let pattern_str = encode_uuid(pattern_id);
    let tool_str    = encode_uuid(tool_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE learned_patterns SET tool_id = ?2, auto_created = 1
           WHERE id = ?1 AND tool_id IS NULL",
          rusqlite::params![pattern_str, tool_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn list_patterns(
    &self,
    kind: Option<PatternKind>,
  ) -> Result<Vec<LearnedPattern>> {
    match kind {
      Some(k) => {
        self
          .fetch_patterns(
            format!(
              "SELECT {PATTERN_COLUMNS} FROM learned_patterns WHERE pattern_type = ?1
               ORDER BY occurrences DESC, pattern_signature"
            ),
            vec![Value::Text(k.as_str().to_owned())],
          )
          .await
      }
      None => {
        self
          .fetch_patterns(
            format!(
              "SELECT {PATTERN_COLUMNS} FROM learned_patterns
               ORDER BY occurrences DESC, pattern_signature"
            ),
            vec![],
          )
          .await
      }
    }
  }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  async fn insert_artifact(&self, input: NewGeneratedTool) -> Result<GeneratedTool> {
    let artifact = GeneratedTool {
      id:                Uuid::new_v4(),
      tool_name:         input.tool_name,
      category:          input.category,
      source_pattern_id: input.source_pattern_id,
      template:          input.template,
      config:            input.config,
      is_active:         true,
      usage_count:       0,
      success_count:     0,
      last_used_at:      None,
      created_at:        now(),
    };

    let id_str      = encode_uuid(artifact.id);
    let name        = artifact.tool_name.clone();
    let category    = artifact.category.clone();
    let pattern_str = artifact.source_pattern_id.map(encode_uuid);
    let code        = serde_json::to_string(&artifact.template)?;
    let config_str  = serde_json::to_string(&artifact.config)?;
    let at_str      = encode_dt(artifact.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO generated_tools (
             id, tool_name, category, source_pattern_id, code_content, config, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, name, category, pattern_str, code, config_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(artifact)
  }

  async fn get_artifact(&self, id: Uuid) -> Result<Option<GeneratedTool>> {
    Ok(
      self
        .fetch_artifacts(
          format!("SELECT {ARTIFACT_COLUMNS} FROM generated_tools WHERE id = ?1"),
          vec![Value::Text(encode_uuid(id))],
        )
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_artifacts(&self, active_only: bool) -> Result<Vec<GeneratedTool>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    self
      .fetch_artifacts(
        format!(
          "SELECT {ARTIFACT_COLUMNS} FROM generated_tools {filter}
           ORDER BY created_at, rowid"
        ),
        vec![],
      )
      .await
  }

  async fn deactivate_artifact(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE generated_tools SET is_active = 0 WHERE id = ?1 AND is_active = 1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn record_artifact_usage(
    &self,
    id: Uuid,
    success: bool,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE generated_tools
           SET usage_count = usage_count + 1,
               success_count = success_count + ?2,
               last_used_at = ?3
           WHERE id = ?1",
          rusqlite::params![id_str, i64::from(success), at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Rules ─────────────────────────────────────────────────────────────────

  async fn create_rule(&self, input: NewValidationRule) -> Result<ValidationRule> {
    let created_at = now();
    let rule = ValidationRule {
      rule_id: input
        .rule_id
        .unwrap_or_else(|| format!("rule-{}", Uuid::new_v4().simple())),
      scope: input.scope,
      category: input.category,
      priority: input.priority,
      technology: input.technology,
      pattern: input.pattern,
      message: input.message,
      suggestion: input.suggestion,
      auto_fix: input.auto_fix,
      client_name: input.client_name,
      project_path: input.project_path,
      confidence: input.confidence.clamp(0.0, 1.0),
      effectiveness_score: 0.0,
      is_active: true,
      learned_from: input.learned_from,
      created_at,
      updated_at: created_at,
      scope_changed_at: created_at,
    };

    let row = rule.clone();
    let at_str = encode_dt(created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!(
            "INSERT INTO validation_rules ({RULE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?15, ?15, ?15)
             ON CONFLICT(rule_id) DO NOTHING"
          ),
          rusqlite::params![
            row.rule_id,
            row.scope.as_str(),
            row.category,
            row.priority.as_str(),
            row.technology,
            row.pattern,
            row.message,
            row.suggestion,
            row.auto_fix,
            row.client_name,
            row.project_path,
            row.confidence,
            row.effectiveness_score,
            row.learned_from,
            at_str,
          ],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::DuplicateRule(rule.rule_id));
    }
    Ok(rule)
  }

  async fn get_rule(&self, rule_id: &str) -> Result<Option<ValidationRule>> {
    Ok(
      self
        .fetch_rules(
          format!("SELECT {RULE_COLUMNS} FROM validation_rules WHERE rule_id = ?1"),
          vec![Value::Text(rule_id.to_owned())],
        )
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn rules_for_scope(&self, query: &RuleQuery) -> Result<Vec<ValidationRule>> {
    let scopes: Vec<Scope> = if query.scopes.is_empty() {
      Scope::ALL.to_vec()
    } else {
      query.scopes.clone()
    };

    // ?1 client, ?2 project, ?3 technology, then one placeholder per scope.
    let placeholders = (0..scopes.len())
      .map(|i| format!("?{}", i + 4))
      .collect::<Vec<_>>()
      .join(", ");

    let mut args = vec![
      query.client_name.clone().map_or(Value::Null, Value::Text),
      query.project_path.clone().map_or(Value::Null, Value::Text),
      query.technology.clone().map_or(Value::Null, Value::Text),
    ];
    args.extend(scopes.iter().map(|s| Value::Text(s.as_str().to_owned())));

    let mut rules = self
      .fetch_rules(
        format!(
          "SELECT {RULE_COLUMNS} FROM validation_rules
           WHERE is_active = 1
             AND scope IN ({placeholders})
             AND (?3 IS NULL OR technology IS NULL OR technology = ?3)
             AND (
               scope IN ('global', 'organization')
               OR (scope = 'client'  AND client_name  = ?1)
               OR (scope = 'project' AND project_path = ?2)
             )"
        ),
        args,
      )
      .await?;

    rules.sort_by(|a, b| {
      b.priority
        .cmp(&a.priority)
        .then(b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    Ok(rules)
  }

  async fn active_rules(&self) -> Result<Vec<ValidationRule>> {
    self
      .fetch_rules(
        format!(
          "SELECT {RULE_COLUMNS} FROM validation_rules WHERE is_active = 1 ORDER BY rule_id"
        ),
        vec![],
      )
      .await
  }

  async fn promote_rule(
    &self,
    rule_id: &str,
    from: Scope,
    to: Scope,
    client_name: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let rule_id = rule_id.to_owned();
    let at_str  = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE validation_rules
           SET scope = ?3,
               client_name = COALESCE(client_name, ?4),
               scope_changed_at = ?5,
               updated_at = ?5
           WHERE rule_id = ?1 AND scope = ?2 AND is_active = 1",
          rusqlite::params![rule_id, from.as_str(), to.as_str(), client_name, at_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn update_rule_pattern(
    &self,
    rule_id: &str,
    pattern: String,
    confidence: f64,
  ) -> Result<bool> {
    let rule_id = rule_id.to_owned();
    let at_str  = encode_dt(now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE validation_rules SET pattern = ?2, confidence = ?3, updated_at = ?4
           WHERE rule_id = ?1",
          rusqlite::params![rule_id, pattern, confidence.clamp(0.0, 1.0), at_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn set_rule_confidence(&self, rule_id: &str, confidence: f64) -> Result<bool> {
    self
      .update_rule(
        "UPDATE validation_rules SET confidence = ?2, updated_at = ?3 WHERE rule_id = ?1",
        rule_id,
        Value::Real(confidence.clamp(0.0, 1.0)),
      )
      .await
  }

  async fn set_rule_effectiveness(&self, rule_id: &str, score: f64) -> Result<bool> {
    self
      .update_rule(
        "UPDATE validation_rules SET effectiveness_score = ?2, updated_at = ?3
         WHERE rule_id = ?1",
        rule_id,
        Value::Real(score.clamp(0.0, 1.0)),
      )
      .await
  }

  async fn deactivate_rule(&self, rule_id: &str) -> Result<bool> {
    self
      .update_rule(
        "UPDATE validation_rules SET is_active = ?2, updated_at = ?3
         WHERE rule_id = ?1 AND is_active = 1",
        rule_id,
        Value::Integer(0),
      )
      .await
  }

  // ── Applications ──────────────────────────────────────────────────────────

  async fn record_application(
    &self,
    input: NewRuleApplication,
  ) -> Result<RuleApplication> {
    let application = RuleApplication {
      id:                Uuid::new_v4(),
      rule_id:           input.rule_id,
      project_path:      input.project_path,
      client_name:       input.client_name,
      file_path:         input.file_path,
      line_number:       input.line_number,
      success:           input.success,
      false_positive:    input.false_positive,
      fix_applied:       input.fix_applied,
      execution_time_ms: input.execution_time_ms,
      feedback:          input.feedback,
      context:           input.context,
      applied_at:        input.applied_at.unwrap_or_else(now),
    };

    let row    = application.clone();
    let id_str = encode_uuid(row.id);
    let at_str = encode_dt(row.applied_at);
    let time   = sql_u64(row.execution_time_ms);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM validation_rules WHERE rule_id = ?1",
            rusqlite::params![row.rule_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(false);
        }
        conn.execute(
          &format!(
            "INSERT INTO rule_applications ({APPLICATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            id_str,
            row.rule_id,
            row.project_path,
            row.client_name,
            row.file_path,
            row.line_number,
            row.success,
            row.false_positive,
            row.fix_applied,
            time,
            row.feedback,
            row.context,
            at_str,
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::RuleNotFound(application.rule_id));
    }
    Ok(application)
  }

  async fn application_stats(
    &self,
    rule_id: &str,
    since: DateTime<Utc>,
  ) -> Result<ApplicationStats> {
    let rule_id   = rule_id.to_owned();
    let since_str = encode_dt(since);

    let (raw, top) = self
      .conn
      .call(move |conn| {
        let raw = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(success), 0),
                  COALESCE(SUM(false_positive), 0),
                  COALESCE(SUM(fix_applied), 0),
                  COALESCE(SUM(execution_time_ms), 0),
                  COUNT(DISTINCT project_path),
                  COUNT(DISTINCT client_name)
           FROM rule_applications
           WHERE rule_id = ?1 AND applied_at >= ?2",
          rusqlite::params![rule_id, since_str],
          |row| RawStats::from_row(row, 0),
        )?;
        let top = top_client(conn, &rule_id, &since_str)?;
        Ok((raw, top))
      })
      .await?;

    Ok(raw.into_stats(top))
  }

  async fn promotion_candidates(
    &self,
    since: DateTime<Utc>,
    min_applications: u64,
  ) -> Result<Vec<RuleEvidence>> {
    self
      .fetch_evidence(
        format!(
          "SELECT {RULE_COLUMNS_R},
                  COUNT(a.id),
                  COALESCE(SUM(a.success), 0),
                  COALESCE(SUM(a.false_positive), 0),
                  COALESCE(SUM(a.fix_applied), 0),
                  COALESCE(SUM(a.execution_time_ms), 0),
                  COUNT(DISTINCT a.project_path),
                  COUNT(DISTINCT a.client_name)
           FROM validation_rules r
           JOIN rule_applications a
             ON a.rule_id = r.rule_id
            AND a.applied_at >= MAX(?1, r.scope_changed_at)
           WHERE r.is_active = 1
             AND r.scope IN ('project', 'client', 'organization')
           GROUP BY r.rule_id
           HAVING COUNT(a.id) >= ?2
           ORDER BY r.rule_id"
        ),
        encode_dt(since),
        min_applications,
        true,
      )
      .await
  }

  async fn deactivation_candidates(
    &self,
    since: DateTime<Utc>,
    min_applications: u64,
  ) -> Result<Vec<RuleEvidence>> {
    self
      .fetch_evidence(
        format!(
          "SELECT {RULE_COLUMNS_R},
                  COUNT(a.id),
                  COALESCE(SUM(a.success), 0),
                  COALESCE(SUM(a.false_positive), 0),
                  COALESCE(SUM(a.fix_applied), 0),
                  COALESCE(SUM(a.execution_time_ms), 0),
                  COUNT(DISTINCT a.project_path),
                  COUNT(DISTINCT a.client_name)
           FROM validation_rules r
           JOIN rule_applications a
             ON a.rule_id = r.rule_id
            AND a.applied_at >= ?1
           WHERE r.is_active = 1
           GROUP BY r.rule_id
           HAVING COUNT(a.id) >= ?2
           ORDER BY r.rule_id"
        ),
        encode_dt(since),
        min_applications,
        false,
      )
      .await
  }

  async fn applications_for_rule(&self, rule_id: &str) -> Result<Vec<RuleApplication>> {
    self
      .fetch_applications(
        format!(
          "SELECT {APPLICATION_COLUMNS} FROM rule_applications WHERE rule_id = ?1
           ORDER BY applied_at, rowid"
        ),
        vec![Value::Text(rule_id.to_owned())],
      )
      .await
  }

  async fn pending_feedback(&self, since: DateTime<Utc>) -> Result<Vec<RuleApplication>> {
    self
      .fetch_applications(
        format!(
          "SELECT {APPLICATION_COLUMNS} FROM rule_applications
           WHERE success = 0
             AND feedback IS NOT NULL
             AND applied_at >= ?1
             AND id NOT IN (SELECT application_id FROM feedback_consumptions)
           ORDER BY applied_at, rowid"
        ),
        vec![Value::Text(encode_dt(since))],
      )
      .await
  }

  async fn mark_feedback_processed(&self, application_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(application_id);
    let at_str = encode_dt(now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO feedback_consumptions (application_id, processed_at)
           VALUES (?1, ?2)",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Knowledge ─────────────────────────────────────────────────────────────

  async fn record_knowledge(&self, input: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
    let entry = KnowledgeEntry {
      id:         Uuid::new_v4(),
      entry_type: input.entry_type,
      title:      input.title,
      content:    input.content,
      tags:       input.tags,
      created_at: now(),
    };

    let id_str      = encode_uuid(entry.id);
    let type_str    = entry.entry_type.as_str();
    let title       = entry.title.clone();
    let content_str = serde_json::to_string(&entry.content)?;
    let tags_str    = serde_json::to_string(&entry.tags)?;
    let at_str      = encode_dt(entry.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO knowledge_entries ({KNOWLEDGE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
          ),
          rusqlite::params![id_str, type_str, title, content_str, tags_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn list_knowledge(
    &self,
    entry_type: Option<EntryType>,
    limit: usize,
  ) -> Result<Vec<KnowledgeEntry>> {
    let type_str = entry_type.map(|t| t.as_str().to_owned());
    let limit    = sql_count(limit);

    let raws: Vec<RawKnowledge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {KNOWLEDGE_COLUMNS} FROM knowledge_entries
           WHERE ?1 IS NULL OR entry_type = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![type_str, limit], RawKnowledge::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKnowledge::into_entry).collect()
  }

  // ── Leases ────────────────────────────────────────────────────────────────

  async fn try_acquire_lease(
    &self,
    name: &str,
    holder: &str,
    ttl: Duration,
  ) -> Result<bool> {
    let name       = name.to_owned();
    let holder     = holder.to_owned();
    let now_at     = now();
    let now_str    = encode_dt(now_at);
    let expiry_str = encode_dt(now_at + ttl);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO cycle_leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(name) DO UPDATE
             SET holder = excluded.holder, expires_at = excluded.expires_at
             WHERE cycle_leases.expires_at <= ?4",
          rusqlite::params![name, holder, expiry_str, now_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
    let name   = name.to_owned();
    let holder = holder.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM cycle_leases WHERE name = ?1 AND holder = ?2",
          rusqlite::params![name, holder],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
