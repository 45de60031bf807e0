//! The artifact generator: renders a promoted pattern into a stored template.

use ratchet_core::{
  artifact::{
    AUTOMATED_CATEGORY, ArtifactTemplate, GeneratedTool, NewGeneratedTool,
    TemplateStep,
  },
  knowledge::{EntryType, NewKnowledgeEntry},
  pattern::{LearnedPattern, Suggestion},
  store::LearningStore,
};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

pub struct ArtifactGenerator<'a, S> {
  store: &'a S,
}

impl<'a, S: LearningStore> ArtifactGenerator<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Generate, persist and link the artifact for `pattern`.
  ///
  /// Returns `None` when the pattern already has an artifact, carries no
  /// suggestion, or another pass linked one first. In the last case the
  /// artifact inserted here is deactivated again so the pattern keeps
  /// exactly one.
  pub async fn generate(&self, pattern: &LearnedPattern) -> Result<Option<GeneratedTool>> {
    if pattern.tool_id.is_some() {
      return Ok(None);
    }
    let Some(suggestion) = &pattern.suggestion else {
      tracing::warn!(signature = %pattern.signature, "pattern has no suggestion; nothing to generate");
      return Ok(None);
    };

    let name = artifact_name(suggestion.name(), &pattern.signature);
    let tool = self
      .store
      .insert_artifact(NewGeneratedTool {
        tool_name:         name.clone(),
        category:          AUTOMATED_CATEGORY.to_owned(),
        source_pattern_id: Some(pattern.id),
        template:          render(&name, suggestion),
        config:            serde_json::to_value(suggestion)?,
      })
      .await
      .map_err(Error::store)?;

    if !self
      .store
      .link_artifact(pattern.id, tool.id)
      .await
      .map_err(Error::store)?
    {
      tracing::warn!(
        signature = %pattern.signature,
        tool = %tool.tool_name,
        "pattern was linked concurrently; retiring duplicate artifact"
      );
      self.store.deactivate_artifact(tool.id).await.map_err(Error::store)?;
      return Ok(None);
    }

    self
      .store
      .record_knowledge(
        NewKnowledgeEntry::new(
          EntryType::Documentation,
          format!("Generated artifact {name}"),
          json!({
            "tool_id":     tool.id,
            "tool_name":   name,
            "pattern_id":  pattern.id,
            "signature":   pattern.signature,
            "kind":        pattern.kind,
            "occurrences": pattern.occurrences,
            "confidence":  pattern.confidence,
          }),
        )
        .tagged(["artifact", "auto_generated", pattern.kind.as_str()]),
      )
      .await
      .map_err(Error::store)?;

    tracing::info!(
      tool = %tool.tool_name,
      occurrences = pattern.occurrences,
      confidence = pattern.confidence,
      "generated artifact"
    );
    Ok(Some(tool))
  }
}

/// `<suggestion name>_<first 8 hex digits of sha256(signature)>`.
pub fn artifact_name(base: &str, signature: &str) -> String {
  let digest = Sha256::digest(signature.as_bytes());
  format!("{base}_{}", hex::encode(&digest[..4]))
}

fn render(name: &str, suggestion: &Suggestion) -> ArtifactTemplate {
  match suggestion {
    Suggestion::Sequence { description, steps, .. } => ArtifactTemplate::Sequence {
      name:        name.to_owned(),
      description: description.clone(),
      steps:       steps
        .iter()
        .map(|s| TemplateStep {
          tool_name:  s.tool_name.clone(),
          parameters: s.parameters.clone(),
        })
        .collect(),
    },
    Suggestion::ParameterPreset { description, base_tool, preset, .. } => {
      ArtifactTemplate::Preset {
        name:        name.to_owned(),
        description: description.clone(),
        base_tool:   base_tool.clone(),
        preset:      preset.clone(),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn artifact_name_is_stable_and_distinct() {
    let a = artifact_name("read_write_workflow", "read:{}->write:{}");
    assert_eq!(a, artifact_name("read_write_workflow", "read:{}->write:{}"));
    assert_ne!(a, artifact_name("read_write_workflow", "read:{x=1}->write:{}"));

    let suffix = a.rsplit('_').next().unwrap();
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
  }
}
