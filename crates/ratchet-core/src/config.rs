//! Tunable thresholds for the miner, promoter and propagation cycle.
//!
//! Both structs deserialise with every field optional, so a config file only
//! needs to name what it overrides.

use chrono::Duration;
use serde::{Deserialize, Serialize};

// ─── Pattern learning ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
  /// Minimum in-pass count for a signature to become a candidate.
  pub pattern_threshold:       u32,
  /// Minimum stored occurrences before an artifact is generated.
  pub auto_generate_threshold: u32,
  /// Minimum stored confidence before an artifact is generated.
  pub confidence_threshold:    f64,
  /// Confidence added each time a stored pattern is re-observed.
  pub confidence_step:         f64,
  pub min_sequence_len:        usize,
  pub max_sequence_len:        usize,
  /// Strings longer than this are normalized to `<string>`.
  pub large_string_len:        usize,
  /// Integers beyond this magnitude are normalized to `<number>`.
  pub literal_number_limit:    i64,
  /// How far back a mining pass reads.
  pub lookback_hours:          i64,
  /// Upper bound on executions read per pass.
  pub max_executions:          usize,
}

impl Default for LearningConfig {
  fn default() -> Self {
    Self {
      pattern_threshold:       2,
      auto_generate_threshold: 3,
      confidence_threshold:    0.6,
      confidence_step:         0.1,
      min_sequence_len:        2,
      max_sequence_len:        5,
      large_string_len:        20,
      literal_number_limit:    1_000_000,
      lookback_hours:          24 * 7,
      max_executions:          1000,
    }
  }
}

impl LearningConfig {
  pub fn lookback(&self) -> Duration { Duration::hours(self.lookback_hours) }
}

// ─── Rule propagation ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
  pub promotion_window_days:           i64,
  /// Minimum applications in the promotion window.
  pub min_applications:                u64,
  pub min_success_rate:                f64,
  pub max_false_positive_rate:         f64,
  pub min_effectiveness:               f64,
  /// Distinct projects required to promote a `project` rule.
  pub min_projects_from_project:       u64,
  /// Distinct projects required to promote a `client` or `organization`
  /// rule.
  pub min_projects_from_wider:         u64,
  /// Distinct clients required to promote a `client` rule.
  pub min_clients_from_client:         u64,

  pub failure_window_hours:            i64,

  pub deactivation_window_days:        i64,
  pub deactivation_min_applications:   u64,
  pub deactivate_below_effectiveness:  f64,
  pub deactivate_below_success_rate:   f64,
  /// The success-rate test only applies above this many applications.
  pub success_rate_min_applications:   u64,
  pub deactivate_above_false_positive: f64,

  pub boost_above_effectiveness:       f64,
  pub decay_below_effectiveness:       f64,
  pub confidence_step:                 f64,
  pub min_confidence:                  f64,

  /// Window over which `effectiveness_score` is recomputed.
  pub effectiveness_window_days:       i64,
  /// Applications needed before the score reaches full weight.
  pub full_weight_applications:        u64,
}

impl Default for PropagationConfig {
  fn default() -> Self {
    Self {
      promotion_window_days:           7,
      min_applications:                5,
      min_success_rate:                0.7,
      max_false_positive_rate:         0.1,
      min_effectiveness:               0.75,
      min_projects_from_project:       2,
      min_projects_from_wider:         3,
      min_clients_from_client:         2,

      failure_window_hours:            24,

      deactivation_window_days:        30,
      deactivation_min_applications:   10,
      deactivate_below_effectiveness:  0.2,
      deactivate_below_success_rate:   0.3,
      success_rate_min_applications:   20,
      deactivate_above_false_positive: 0.5,

      boost_above_effectiveness:       0.8,
      decay_below_effectiveness:       0.3,
      confidence_step:                 0.1,
      min_confidence:                  0.1,

      effectiveness_window_days:       30,
      full_weight_applications:        10,
    }
  }
}

impl PropagationConfig {
  pub fn promotion_window(&self) -> Duration {
    Duration::days(self.promotion_window_days)
  }

  pub fn failure_window(&self) -> Duration {
    Duration::hours(self.failure_window_hours)
  }

  pub fn deactivation_window(&self) -> Duration {
    Duration::days(self.deactivation_window_days)
  }

  pub fn effectiveness_window(&self) -> Duration {
    Duration::days(self.effectiveness_window_days)
  }
}
