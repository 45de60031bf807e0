//! The propagation cycle: promotion, learning from feedback, deactivation,
//! confidence nudges and the audit entry, in that order.
//!
//! Every step is a set of independent conditional writes, so a cycle that
//! dies halfway can simply be run again: promotion evidence is counted from
//! the rule's last scope change, consumed feedback is remembered, and
//! deactivation is terminal.

use std::time::Instant;

use chrono::{DateTime, Utc};
use ratchet_core::{
  Scope,
  config::PropagationConfig,
  knowledge::{EntryType, NewKnowledgeEntry},
  rule::{
    ApplicationStats, NewValidationRule, RuleApplication, RuleEvidence,
    ValidationRule,
  },
  store::LearningStore,
};
use regex::Regex;
use serde::Serialize;
use serde_json::json;

use crate::{EPSILON, Error, Result, rulebook::RuleBook};

/// Feedback phrase that triggers narrowing of the offending rule.
const FALSE_POSITIVE_MARKER: &str = "false positive";
/// Feedback phrase that triggers learning a new rule from the context.
const MISSING_PATTERN_MARKER: &str = "missing pattern";

/// Prefix applied by the second refinement rung.
const LINE_ANCHOR: &str = r"(?m)^\s*";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Promotion {
  pub rule_id:       String,
  pub from:          Scope,
  pub to:            Scope,
  pub effectiveness: f64,
  pub success_rate:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deactivation {
  pub rule_id: String,
  pub reason:  String,
}

/// Outcome of one [`PropagationCycle::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
  pub promoted:    Vec<Promotion>,
  /// Rules narrowed (or, once narrowing is exhausted, down-weighted) in
  /// response to false-positive feedback.
  pub refined:     Vec<String>,
  /// Rules created from missing-pattern feedback.
  pub learned:     Vec<String>,
  pub deactivated: Vec<Deactivation>,
  pub boosted:     usize,
  pub decayed:     usize,
  pub duration_ms: u64,
}

pub struct PropagationCycle<'a, S> {
  store:  &'a S,
  config: &'a PropagationConfig,
}

impl<'a, S: LearningStore> PropagationCycle<'a, S> {
  pub fn new(store: &'a S, config: &'a PropagationConfig) -> Self { Self { store, config } }

  /// Run one complete cycle as of `now`.
  ///
  /// On failure an `error` knowledge entry is written and the error is
  /// returned; whatever the completed steps changed stays changed.
  pub async fn run(&self, now: DateTime<Utc>) -> Result<CycleReport> {
    let started = Instant::now();
    let mut report = CycleReport::default();

    if let Err(e) = self.run_steps(now, &mut report).await {
      tracing::error!(error = %e, "propagation cycle failed");
      let entry = NewKnowledgeEntry::new(
        EntryType::Error,
        "Propagation cycle failed",
        json!({
          "error":       e.to_string(),
          "promoted":    report.promoted.len(),
          "deactivated": report.deactivated.len(),
          "learned":     report.learned.len(),
        }),
      )
      .tagged(["propagation", "failure"]);
      if let Err(audit) = self.store.record_knowledge(entry).await {
        tracing::warn!(error = %audit, "could not record cycle failure");
      }
      return Err(e);
    }

    report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    self
      .store
      .record_knowledge(
        NewKnowledgeEntry::new(
          EntryType::SystemActivity,
          "Propagation cycle completed",
          json!({
            "promoted":    report.promoted.len(),
            "deactivated": report.deactivated.len(),
            "learned":     report.learned.len(),
            "refined":     report.refined.len(),
            "boosted":     report.boosted,
            "decayed":     report.decayed,
            "duration_ms": report.duration_ms,
          }),
        )
        .tagged(["propagation"]),
      )
      .await
      .map_err(Error::store)?;

    tracing::info!(
      promoted = report.promoted.len(),
      deactivated = report.deactivated.len(),
      learned = report.learned.len(),
      refined = report.refined.len(),
      duration_ms = report.duration_ms,
      "propagation cycle completed"
    );
    Ok(report)
  }

  async fn run_steps(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
    self.promote(now, report).await?;
    self.learn_from_failures(now, report).await?;
    self.deactivate(now, report).await?;
    self.adjust_confidence(report).await?;
    Ok(())
  }

  // ─── 1. Promotion ──────────────────────────────────────────────────────────

  async fn promote(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
    let candidates = self
      .store
      .promotion_candidates(now - self.config.promotion_window(), self.config.min_applications)
      .await
      .map_err(Error::store)?;

    for evidence in candidates {
      if !self.is_promotable(&evidence) {
        continue;
      }
      let RuleEvidence { rule, stats } = evidence;
      let to = rule.scope.widen();
      if to == rule.scope {
        continue;
      }

      let adopted_client = if rule.scope == Scope::Project && rule.client_name.is_none() {
        let Some(top) = stats.top_client.clone() else {
          tracing::debug!(rule_id = %rule.rule_id, "no client evidence; project rule stays put");
          continue;
        };
        Some(top)
      } else {
        None
      };

      let promoted = self
        .store
        .promote_rule(&rule.rule_id, rule.scope, to, adopted_client.clone(), now)
        .await
        .map_err(Error::store)?;
      if !promoted {
        continue;
      }

      let promotion = Promotion {
        rule_id:       rule.rule_id.clone(),
        from:          rule.scope,
        to,
        effectiveness: rule.effectiveness_score,
        success_rate:  stats.success_rate(),
      };
      self
        .store
        .record_knowledge(
          NewKnowledgeEntry::new(
            EntryType::RulePromotion,
            format!("Promoted {} from {} to {}", rule.rule_id, rule.scope, to),
            json!({
              "rule_id":             rule.rule_id,
              "from":                rule.scope,
              "to":                  to,
              "effectiveness":       rule.effectiveness_score,
              "success_rate":        stats.success_rate(),
              "false_positive_rate": stats.false_positive_rate(),
              "applications":        stats.applications,
              "distinct_projects":   stats.distinct_projects,
              "distinct_clients":    stats.distinct_clients,
              "avg_execution_ms":    stats.avg_execution_ms(),
              "client_name":         adopted_client.or_else(|| rule.client_name.clone()),
            }),
          )
          .tagged(["promotion", to.as_str()]),
        )
        .await
        .map_err(Error::store)?;

      tracing::info!(rule_id = %promotion.rule_id, from = %promotion.from, to = %promotion.to, "promoted rule");
      report.promoted.push(promotion);
    }
    Ok(())
  }

  fn is_promotable(&self, evidence: &RuleEvidence) -> bool {
    let RuleEvidence { rule, stats } = evidence;
    let cfg = self.config;

    let min_projects = match rule.scope {
      Scope::Project => cfg.min_projects_from_project,
      _ => cfg.min_projects_from_wider,
    };
    let enough_clients =
      rule.scope != Scope::Client || stats.distinct_clients >= cfg.min_clients_from_client;

    stats.success_rate() + EPSILON >= cfg.min_success_rate
      && stats.false_positive_rate() <= cfg.max_false_positive_rate + EPSILON
      && rule.effectiveness_score + EPSILON >= cfg.min_effectiveness
      && stats.distinct_projects >= min_projects
      && enough_clients
  }

  // ─── 2. Learning from failures ─────────────────────────────────────────────

  async fn learn_from_failures(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
    let pending = self
      .store
      .pending_feedback(now - self.config.failure_window())
      .await
      .map_err(Error::store)?;

    for application in pending {
      // Consumed even when learning from it fails.
      if let Err(e) = self.learn_from(&application, report).await {
        tracing::warn!(
          application = %application.id,
          rule_id = %application.rule_id,
          error = %e,
          "could not learn from feedback; skipping it"
        );
      }

      self
        .store
        .mark_feedback_processed(application.id)
        .await
        .map_err(Error::store)?;
    }
    Ok(())
  }

  async fn learn_from(&self, application: &RuleApplication, report: &mut CycleReport) -> Result<()> {
    let feedback = application.feedback.as_deref().unwrap_or_default().to_lowercase();
    let rule = self.store.get_rule(&application.rule_id).await.map_err(Error::store)?;
    let Some(rule) = rule.filter(|r| r.is_active) else {
      return Ok(());
    };

    if feedback.contains(FALSE_POSITIVE_MARKER) {
      self.refine(&rule).await?;
      report.refined.push(rule.rule_id.clone());
    }
    if feedback.contains(MISSING_PATTERN_MARKER)
      && let Some(learned) = self.learn_rule(&rule, application).await?
    {
      report.learned.push(learned.rule_id);
    }
    Ok(())
  }

  /// Narrow the rule's pattern by one rung, or lower its confidence once
  /// the ladder is exhausted.
  async fn refine(&self, rule: &ValidationRule) -> Result<()> {
    match refine_pattern(&rule.pattern) {
      Some(pattern) => {
        tracing::info!(rule_id = %rule.rule_id, %pattern, "narrowed rule pattern");
        self
          .store
          .update_rule_pattern(&rule.rule_id, pattern, rule.confidence)
          .await
          .map_err(Error::store)?;
      }
      None => {
        let confidence =
          (rule.confidence - self.config.confidence_step).max(self.config.min_confidence);
        tracing::info!(rule_id = %rule.rule_id, confidence, "pattern cannot narrow further; lowered confidence");
        self
          .store
          .set_rule_confidence(&rule.rule_id, confidence)
          .await
          .map_err(Error::store)?;
      }
    }
    Ok(())
  }

  /// Seed a project-scope rule from the offending input.
  async fn learn_rule(
    &self,
    parent: &ValidationRule,
    application: &RuleApplication,
  ) -> Result<Option<ValidationRule>> {
    let Some(context) = present(application.context.as_deref()) else {
      tracing::debug!(application = %application.id, "missing-pattern feedback without context");
      return Ok(None);
    };
    let Some(project) = present(application.project_path.as_deref())
      .or_else(|| present(parent.project_path.as_deref()))
    else {
      tracing::debug!(application = %application.id, "missing-pattern feedback without a project");
      return Ok(None);
    };

    let input = NewValidationRule {
      rule_id:      None,
      scope:        Scope::Project,
      category:     parent.category.clone(),
      priority:     parent.priority,
      technology:   parent.technology.clone(),
      pattern:      regex::escape(context),
      message:      format!("Learned from feedback on {}", parent.rule_id),
      suggestion:   application.feedback.clone(),
      auto_fix:     None,
      client_name:  present(application.client_name.as_deref())
        .or_else(|| present(parent.client_name.as_deref()))
        .map(str::to_owned),
      project_path: Some(project.to_owned()),
      confidence:   0.5,
      learned_from: Some(format!("feedback:{}", application.id)),
    };
    let rule = RuleBook::new(self.store).create_rule(input).await?;
    Ok(Some(rule))
  }

  // ─── 3. Deactivation ───────────────────────────────────────────────────────

  async fn deactivate(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
    let candidates = self
      .store
      .deactivation_candidates(
        now - self.config.deactivation_window(),
        self.config.deactivation_min_applications,
      )
      .await
      .map_err(Error::store)?;

    for RuleEvidence { rule, stats } in candidates {
      let Some(reason) = self.deactivation_reason(&rule, &stats) else {
        continue;
      };
      if !self
        .store
        .deactivate_rule(&rule.rule_id)
        .await
        .map_err(Error::store)?
      {
        continue;
      }

      self
        .store
        .record_knowledge(
          NewKnowledgeEntry::new(
            EntryType::SystemActivity,
            format!("Deactivated {}", rule.rule_id),
            json!({
              "rule_id":             rule.rule_id,
              "scope":               rule.scope,
              "reason":              reason,
              "effectiveness":       rule.effectiveness_score,
              "success_rate":        stats.success_rate(),
              "false_positive_rate": stats.false_positive_rate(),
              "applications":        stats.applications,
            }),
          )
          .tagged(["deactivation"]),
        )
        .await
        .map_err(Error::store)?;

      tracing::info!(rule_id = %rule.rule_id, %reason, "deactivated rule");
      report.deactivated.push(Deactivation { rule_id: rule.rule_id, reason });
    }
    Ok(())
  }

  fn deactivation_reason(
    &self,
    rule: &ValidationRule,
    stats: &ApplicationStats,
  ) -> Option<String> {
    let cfg = self.config;
    if rule.effectiveness_score < cfg.deactivate_below_effectiveness {
      Some(format!(
        "effectiveness {:.2} below {}",
        rule.effectiveness_score, cfg.deactivate_below_effectiveness
      ))
    } else if stats.success_rate() < cfg.deactivate_below_success_rate
      && stats.applications > cfg.success_rate_min_applications
    {
      Some(format!(
        "success rate {:.2} below {}",
        stats.success_rate(),
        cfg.deactivate_below_success_rate
      ))
    } else if stats.false_positive_rate() > cfg.deactivate_above_false_positive {
      Some(format!(
        "false-positive rate {:.2} above {}",
        stats.false_positive_rate(),
        cfg.deactivate_above_false_positive
      ))
    } else {
      None
    }
  }

  // ─── 4. Confidence ─────────────────────────────────────────────────────────

  async fn adjust_confidence(&self, report: &mut CycleReport) -> Result<()> {
    let cfg = self.config;
    let rules = self.store.active_rules().await.map_err(Error::store)?;

    for rule in rules {
      let next = if rule.effectiveness_score > cfg.boost_above_effectiveness {
        (rule.confidence + cfg.confidence_step).min(1.0)
      } else if rule.effectiveness_score < cfg.decay_below_effectiveness {
        (rule.confidence - cfg.confidence_step).max(cfg.min_confidence)
      } else {
        continue;
      };
      if (next - rule.confidence).abs() < EPSILON {
        continue;
      }

      self
        .store
        .set_rule_confidence(&rule.rule_id, next)
        .await
        .map_err(Error::store)?;
      if next > rule.confidence {
        report.boosted += 1;
      } else {
        report.decayed += 1;
      }
    }
    Ok(())
  }
}

/// `value` trimmed, unless that leaves nothing.
fn present(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

/// The next rung of the narrowing ladder for `pattern`, or `None` once both
/// rungs are applied.
///
/// 1. `P` becomes `\b(?:P)\b`: whole-word matches only.
/// 2. then `(?m)^\s*` is prefixed: the match must open a line.
pub fn refine_pattern(pattern: &str) -> Option<String> {
  if pattern.starts_with(LINE_ANCHOR) {
    return None;
  }
  let next = if pattern.starts_with(r"\b(?:") && pattern.ends_with(r")\b") {
    format!("{LINE_ANCHOR}{pattern}")
  } else {
    format!(r"\b(?:{pattern})\b")
  };
  Regex::new(&next).is_ok().then_some(next)
}
