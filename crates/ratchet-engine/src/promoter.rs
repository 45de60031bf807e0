//! The pattern promoter: merges mined candidates into the pattern store and
//! hands eligible patterns to the [`ArtifactGenerator`].

use ratchet_core::{
  config::LearningConfig,
  pattern::{LearnedPattern, PatternCandidate},
  store::LearningStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{EPSILON, Error, Result, generator::ArtifactGenerator};

/// What one [`PatternPromoter::apply`] call did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromotionSummary {
  /// Signatures seen for the first time.
  pub inserted:  usize,
  /// Existing signatures re-observed.
  pub updated:   usize,
  /// Candidates whose store update or generation failed.
  pub failed:    usize,
  /// Ids of artifacts generated in this call.
  pub generated: Vec<Uuid>,
}

pub struct PatternPromoter<'a, S> {
  store:  &'a S,
  config: &'a LearningConfig,
}

impl<'a, S: LearningStore> PatternPromoter<'a, S> {
  pub fn new(store: &'a S, config: &'a LearningConfig) -> Self { Self { store, config } }

  /// Whether `pattern` has crossed both auto-generation thresholds.
  pub fn is_eligible(&self, pattern: &LearnedPattern) -> bool {
    pattern.occurrences >= self.config.auto_generate_threshold
      && pattern.confidence + EPSILON >= self.config.confidence_threshold
  }

  /// Merge every candidate. A failure on one candidate is logged and
  /// counted; the rest are still applied.
  pub async fn apply(&self, candidates: &[PatternCandidate]) -> PromotionSummary {
    let mut summary = PromotionSummary::default();
    let generator = ArtifactGenerator::new(self.store);

    for candidate in candidates {
      let (pattern, fresh) = match self.absorb(candidate).await {
        Ok(absorbed) => absorbed,
        Err(e) => {
          tracing::warn!(signature = %candidate.signature, error = %e, "pattern update failed");
          summary.failed += 1;
          continue;
        }
      };
      if fresh {
        summary.inserted += 1;
      } else {
        summary.updated += 1;
      }
      tracing::debug!(
        signature = %pattern.signature,
        occurrences = pattern.occurrences,
        confidence = pattern.confidence,
        fresh,
        "absorbed pattern"
      );

      if pattern.tool_id.is_some() || !self.is_eligible(&pattern) {
        continue;
      }
      match generator.generate(&pattern).await {
        Ok(Some(tool)) => summary.generated.push(tool.id),
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(signature = %pattern.signature, error = %e, "artifact generation failed");
          summary.failed += 1;
        }
      }
    }
    summary
  }

  /// Re-observe the candidate's signature, or insert it if unknown.
  /// Returns the stored pattern and whether it was inserted.
  async fn absorb(&self, candidate: &PatternCandidate) -> Result<(LearnedPattern, bool)> {
    if let Some(pattern) = self
      .store
      .observe_pattern(&candidate.signature, self.config.confidence_step, candidate.last_seen)
      .await
      .map_err(Error::store)?
    {
      return Ok((pattern, false));
    }
    let pattern = self
      .store
      .insert_pattern(candidate)
      .await
      .map_err(Error::store)?;
    Ok((pattern, true))
  }
}
