//! The pattern miner: pure detection over a slice of executions.
//!
//! Two detectors run over the successful executions of a window:
//!
//! - **sequences**: every contiguous run of `min_sequence_len..=max_sequence_len`
//!   steps is keyed by its normalized step keys; keys seen at least
//!   `pattern_threshold` times become candidates.
//! - **parameters**: executions are grouped by tool; each large enough group
//!   yields its common/varying keys and the constant/variable class of every
//!   common key.
//!
//! Nothing here touches the store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use ratchet_core::{
  config::LearningConfig,
  execution::{Params, ToolExecution},
  pattern::{
    PatternBody, PatternCandidate, SequenceStep, Suggestion, ValueClass,
    ValueKind,
  },
};

use crate::normalize::{
  SEQUENCE_SEPARATOR, ShapeTag, normalize_params, parameter_signature, step_key,
};

/// Confidence contributed by each in-pass occurrence of a sequence.
const SEQUENCE_CONFIDENCE_PER_HIT: f64 = 0.2;
/// Confidence contributed by each call in a parameter group.
const PARAMETER_CONFIDENCE_PER_HIT: f64 = 0.15;

pub struct PatternMiner<'a> {
  config: &'a LearningConfig,
}

/// Running count for one sequence signature within a pass.
struct Tally {
  count:      u32,
  /// Index and length of the first window that produced the signature.
  start:      usize,
  len:        usize,
  first_seen: DateTime<Utc>,
  last_seen:  DateTime<Utc>,
}

impl<'a> PatternMiner<'a> {
  pub fn new(config: &'a LearningConfig) -> Self { Self { config } }

  /// Detect candidates in `executions`.
  ///
  /// Failed executions are dropped before anything is counted. Fewer than
  /// two successful executions yield no candidates. Results are ordered by
  /// descending occurrences, then signature.
  pub fn detect(&self, executions: &[ToolExecution]) -> Vec<PatternCandidate> {
    let mut successful: Vec<&ToolExecution> =
      executions.iter().filter(|e| e.success).collect();
    if successful.len() < 2 {
      return Vec::new();
    }
    successful.sort_by_key(|e| e.created_at);

    let mut candidates = self.detect_sequences(&successful);
    candidates.extend(self.detect_parameters(&successful));
    candidates.sort_by(|a, b| {
      b.occurrences
        .cmp(&a.occurrences)
        .then_with(|| a.signature.cmp(&b.signature))
    });
    candidates
  }

  // ─── Sequences ─────────────────────────────────────────────────────────────

  fn detect_sequences(&self, executions: &[&ToolExecution]) -> Vec<PatternCandidate> {
    // Step keys are computed once and sliced per window.
    let keys: Vec<String> = executions
      .iter()
      .map(|e| step_key(&e.tool_name, &e.parameters, self.config))
      .collect();
    let n = keys.len();
    let min_len = self.config.min_sequence_len.max(2);
    let max_len = self.config.max_sequence_len.min(n);

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for len in min_len..=max_len {
      for start in 0..=(n - len) {
        let signature = keys[start..start + len].join(SEQUENCE_SEPARATOR);
        let last_seen = executions[start + len - 1].created_at;
        tallies
          .entry(signature)
          .and_modify(|t| {
            t.count = t.count.saturating_add(1);
            t.last_seen = last_seen;
          })
          .or_insert(Tally {
            count: 1,
            start,
            len,
            first_seen: executions[start].created_at,
            last_seen,
          });
      }
    }

    tallies
      .into_iter()
      .filter(|(_, t)| t.count >= self.config.pattern_threshold)
      .map(|(signature, t)| {
        let steps: Vec<SequenceStep> = executions[t.start..t.start + t.len]
          .iter()
          .map(|e| SequenceStep {
            tool_name:  e.tool_name.clone(),
            shape:      normalize_params(&e.parameters, self.config),
            parameters: e.parameters.clone(),
          })
          .collect();
        let tools: Vec<&str> = steps.iter().map(|s| s.tool_name.as_str()).collect();
        let suggestion = Suggestion::Sequence {
          name:        format!("{}_workflow", identifier(&tools.join("_"))),
          description: format!(
            "Runs {} in order (seen {} times)",
            tools.join(" -> "),
            t.count
          ),
          steps:       steps.clone(),
        };
        PatternCandidate {
          signature,
          body: PatternBody::Sequence { steps },
          occurrences: t.count,
          confidence: (f64::from(t.count) * SEQUENCE_CONFIDENCE_PER_HIT).min(1.0),
          suggestion,
          first_seen: t.first_seen,
          last_seen: t.last_seen,
        }
      })
      .collect()
  }

  // ─── Parameters ────────────────────────────────────────────────────────────

  fn detect_parameters(&self, executions: &[&ToolExecution]) -> Vec<PatternCandidate> {
    let mut groups: BTreeMap<&str, Vec<&ToolExecution>> = BTreeMap::new();
    for &e in executions {
      groups.entry(e.tool_name.as_str()).or_default().push(e);
    }

    groups
      .into_iter()
      .filter(|(_, calls)| count_u32(calls.len()) >= self.config.pattern_threshold)
      .filter_map(|(tool, calls)| parameter_candidate(tool, &calls))
      .collect()
  }
}

fn parameter_candidate(tool: &str, calls: &[&ToolExecution]) -> Option<PatternCandidate> {
  let (first, rest) = calls.split_first()?;

  let mut common: BTreeSet<&str> = first.parameters.keys().map(String::as_str).collect();
  let mut all = common.clone();
  for call in rest {
    let keys: BTreeSet<&str> = call.parameters.keys().map(String::as_str).collect();
    common = common.intersection(&keys).copied().collect();
    all.extend(keys);
  }
  let varying: Vec<String> =
    all.difference(&common).map(|k| (*k).to_owned()).collect();

  let mut values: BTreeMap<String, ValueClass> = BTreeMap::new();
  for key in &common {
    let observed: Vec<&serde_json::Value> =
      calls.iter().filter_map(|c| c.parameters.get(*key)).collect();
    if let Some(class) = classify(&observed) {
      values.insert((*key).to_owned(), class);
    }
  }

  if common.is_empty() && values.is_empty() {
    return None;
  }

  let common_keys: Vec<String> = common.iter().map(|k| (*k).to_owned()).collect();
  let preset: Params = values
    .iter()
    .filter_map(|(k, class)| match class {
      ValueClass::Constant { value } => Some((k.clone(), value.clone())),
      ValueClass::Variable { .. } => None,
    })
    .collect();
  let inputs: Vec<String> = values
    .iter()
    .filter_map(|(k, class)| match class {
      ValueClass::Variable { kind } => Some(format!("{k} {}", ShapeTag::placeholder(*kind))),
      ValueClass::Constant { .. } => None,
    })
    .collect();

  let occurrences = count_u32(calls.len());
  let description = if inputs.is_empty() {
    format!("Calls {tool} with {} fixed parameter(s)", preset.len())
  } else {
    format!(
      "Calls {tool} with {} fixed parameter(s); takes {}",
      preset.len(),
      inputs.join(", ")
    )
  };

  Some(PatternCandidate {
    signature: parameter_signature(tool, &common_keys),
    body: PatternBody::Parameter {
      tool_name: tool.to_owned(),
      common_keys,
      varying_keys: varying,
      values,
    },
    occurrences,
    confidence: (f64::from(occurrences) * PARAMETER_CONFIDENCE_PER_HIT).min(1.0),
    suggestion: Suggestion::ParameterPreset {
      name: format!("{}_preset", identifier(tool)),
      description,
      base_tool: tool.to_owned(),
      preset,
    },
    first_seen: first.created_at,
    last_seen: calls.last().map_or(first.created_at, |c| c.created_at),
  })
}

/// `Constant` if every value is identical, `Variable` if they share a
/// primitive type, otherwise no class.
fn classify(values: &[&serde_json::Value]) -> Option<ValueClass> {
  let (first, rest) = values.split_first()?;
  if rest.iter().all(|v| *v == *first) {
    return Some(ValueClass::Constant { value: (*first).clone() });
  }
  let kind = ValueKind::of(first);
  rest
    .iter()
    .all(|v| ValueKind::of(v) == kind)
    .then_some(ValueClass::Variable { kind })
}

/// Reduce a tool name to `[a-z0-9_]` for use in an artifact name.
fn identifier(raw: &str) -> String {
  raw
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
    .collect()
}

fn count_u32(n: usize) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }
