//! The rule application tracker and the effectiveness score.

use chrono::{DateTime, Utc};
use ratchet_core::{
  config::PropagationConfig,
  rule::{ApplicationStats, NewRuleApplication, RuleApplication},
  store::LearningStore,
};

use crate::{Error, Result};

/// `success_rate × (1 − false_positive_rate) × volume weight`, where the
/// volume weight grows linearly to 1 at `full_weight_applications`.
///
/// A rule without applications scores 0.
pub fn effectiveness_score(stats: &ApplicationStats, config: &PropagationConfig) -> f64 {
  if stats.applications == 0 {
    return 0.0;
  }
  let weight = if config.full_weight_applications == 0 {
    1.0
  } else {
    (stats.applications as f64 / config.full_weight_applications as f64).min(1.0)
  };
  (stats.success_rate() * (1.0 - stats.false_positive_rate()) * weight).clamp(0.0, 1.0)
}

pub struct RuleTracker<'a, S> {
  store:  &'a S,
  config: &'a PropagationConfig,
}

impl<'a, S: LearningStore> RuleTracker<'a, S> {
  pub fn new(store: &'a S, config: &'a PropagationConfig) -> Self { Self { store, config } }

  /// Append one application and refresh the rule's effectiveness score.
  pub async fn record(&self, input: NewRuleApplication) -> Result<RuleApplication> {
    if self.store.get_rule(&input.rule_id).await.map_err(Error::store)?.is_none() {
      return Err(Error::RuleNotFound(input.rule_id));
    }
    let application = self
      .store
      .record_application(input)
      .await
      .map_err(Error::store)?;

    let score = self
      .refresh_effectiveness(&application.rule_id, Utc::now().max(application.applied_at))
      .await?;
    tracing::debug!(
      rule_id = %application.rule_id,
      success = application.success,
      effectiveness = score,
      "recorded rule application"
    );
    Ok(application)
  }

  /// Recompute and persist the score over the window ending at `now`.
  pub async fn refresh_effectiveness(&self, rule_id: &str, now: DateTime<Utc>) -> Result<f64> {
    let stats = self
      .store
      .application_stats(rule_id, now - self.config.effectiveness_window())
      .await
      .map_err(Error::store)?;
    let score = effectiveness_score(&stats, self.config);
    self
      .store
      .set_rule_effectiveness(rule_id, score)
      .await
      .map_err(Error::store)?;
    Ok(score)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stats(applications: u64, successes: u64, false_positives: u64) -> ApplicationStats {
    ApplicationStats { applications, successes, false_positives, ..ApplicationStats::default() }
  }

  #[test]
  fn no_applications_scores_zero() {
    assert_eq!(effectiveness_score(&stats(0, 0, 0), &PropagationConfig::default()), 0.0);
  }

  #[test]
  fn low_volume_is_scaled_down() {
    let cfg = PropagationConfig::default();
    let one_shot = effectiveness_score(&stats(1, 1, 0), &cfg);
    let full = effectiveness_score(&stats(10, 10, 0), &cfg);
    assert!((one_shot - 0.1).abs() < 1e-9);
    assert!((full - 1.0).abs() < 1e-9);
  }

  #[test]
  fn false_positives_reduce_score() {
    let cfg = PropagationConfig::default();
    let clean = effectiveness_score(&stats(20, 18, 0), &cfg);
    let noisy = effectiveness_score(&stats(20, 18, 4), &cfg);
    assert!(noisy < clean);
    assert!((noisy - 0.9 * 0.8).abs() < 1e-9);
  }
}
