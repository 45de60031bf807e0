//! Rule authoring and the scoped read contract.

use ratchet_core::{
  Scope,
  rule::{NewValidationRule, RuleQuery, ValidationRule},
  store::LearningStore,
};
use regex::Regex;

use crate::{Error, Result};

pub struct RuleBook<'a, S> {
  store: &'a S,
}

impl<'a, S: LearningStore> RuleBook<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Validate and persist a new, active rule.
  pub async fn create_rule(&self, input: NewValidationRule) -> Result<ValidationRule> {
    validate(&input)?;
    if let Some(id) = &input.rule_id
      && self.store.get_rule(id).await.map_err(Error::store)?.is_some()
    {
      return Err(Error::DuplicateRule(id.clone()));
    }

    let rule = self.store.create_rule(input).await.map_err(Error::store)?;
    tracing::info!(rule_id = %rule.rule_id, scope = %rule.scope, "created rule");
    Ok(rule)
  }

  pub async fn get_rule(&self, rule_id: &str) -> Result<Option<ValidationRule>> {
    self.store.get_rule(rule_id).await.map_err(Error::store)
  }

  /// Active rules visible to the query's identity, highest priority first,
  /// then by confidence.
  ///
  /// `global`/`organization` rules are visible to everyone; `client` rules
  /// only to the owning client; `project` rules only inside the owning
  /// project.
  pub async fn rules_for_scope(&self, query: &RuleQuery) -> Result<Vec<ValidationRule>> {
    let rules = self.store.rules_for_scope(query).await.map_err(Error::store)?;
    let client = query.client_name.as_deref();
    let project = query.project_path.as_deref();
    Ok(
      rules
        .into_iter()
        .filter(|r| r.is_active && r.visible_to(client, project))
        .collect(),
    )
  }
}

fn validate(input: &NewValidationRule) -> Result<()> {
  for (field, value) in [
    ("category", &input.category),
    ("pattern", &input.pattern),
    ("message", &input.message),
  ] {
    if value.trim().is_empty() {
      return Err(Error::InvalidRule(format!("{field} must not be empty")));
    }
  }
  if !(0.0..=1.0).contains(&input.confidence) {
    return Err(Error::InvalidRule(format!(
      "confidence must be within [0, 1], got {}",
      input.confidence
    )));
  }
  match input.scope {
    Scope::Client if blank(input.client_name.as_deref()) => {
      return Err(Error::InvalidRule("client scope requires client_name".into()));
    }
    Scope::Project if blank(input.project_path.as_deref()) => {
      return Err(Error::InvalidRule("project scope requires project_path".into()));
    }
    _ => {}
  }
  Regex::new(&input.pattern).map_err(|source| Error::InvalidPattern {
    pattern: input.pattern.clone(),
    source,
  })?;
  Ok(())
}

fn blank(value: Option<&str>) -> bool { value.is_none_or(|v| v.trim().is_empty()) }
