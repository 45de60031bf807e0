//! Shape normalization of parameter bags.
//!
//! Two executions of the same tool whose arguments differ only in "large"
//! or structural values collapse onto the same step key, which is what lets
//! the miner count them as one recurring shape.
//!
//! Signatures must never collide, so every free-form piece is encoded:
//! literal strings are rendered as JSON strings, and tool names and keys
//! have the signature's delimiters backslash-escaped.

use std::{borrow::Cow, fmt};

use ratchet_core::{
  config::LearningConfig,
  execution::Params,
  pattern::ValueKind,
};
use serde_json::Value;

/// Separator between step keys in a sequence signature.
pub const SEQUENCE_SEPARATOR: &str = "->";

/// Characters with a structural meaning in a signature.
const RESERVED: &[char] = &['\\', '{', '}', ',', '=', ':', '>'];

/// The coarse class a parameter value is reduced to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeTag {
  /// A small scalar kept verbatim, as JSON text.
  Literal(String),
  String,
  Number,
  Boolean,
  Array,
  Object,
}

impl ShapeTag {
  /// The placeholder tag for values of `kind`, ignoring their contents.
  pub fn placeholder(kind: ValueKind) -> Self {
    match kind {
      ValueKind::Null => Self::Literal("null".into()),
      ValueKind::Boolean => Self::Boolean,
      ValueKind::Number => Self::Number,
      ValueKind::String => Self::String,
      ValueKind::Array => Self::Array,
      ValueKind::Object => Self::Object,
    }
  }
}

impl fmt::Display for ShapeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Literal(s) => f.write_str(s),
      Self::String => f.write_str("<string>"),
      Self::Number => f.write_str("<number>"),
      Self::Boolean => f.write_str("<boolean>"),
      Self::Array => f.write_str("<array>"),
      Self::Object => f.write_str("<object>"),
    }
  }
}

/// Classify one value.
///
/// Strings longer than `large_string_len` characters, non-integral numbers
/// and integers beyond `literal_number_limit` lose their value; arrays and
/// objects always do. Booleans and `null` stay literal.
pub fn shape_of(value: &Value, config: &LearningConfig) -> ShapeTag {
  match value {
    Value::Null => ShapeTag::Literal("null".into()),
    Value::Bool(b) => ShapeTag::Literal(b.to_string()),
    Value::Number(n) => match n.as_i64() {
      Some(i) if i.unsigned_abs() <= config.literal_number_limit.unsigned_abs() => {
        ShapeTag::Literal(i.to_string())
      }
      _ => ShapeTag::Number,
    },
    Value::String(s) if s.chars().count() > config.large_string_len => {
      ShapeTag::String
    }
    Value::String(_) => ShapeTag::Literal(value.to_string()),
    Value::Array(_) => ShapeTag::Array,
    Value::Object(_) => ShapeTag::Object,
  }
}

/// Backslash-escape the signature delimiters in a tool name or key.
pub fn escape(raw: &str) -> Cow<'_, str> {
  if !raw.contains(RESERVED) {
    return Cow::Borrowed(raw);
  }
  let mut out = String::with_capacity(raw.len() + 4);
  for c in raw.chars() {
    if RESERVED.contains(&c) {
      out.push('\\');
    }
    out.push(c);
  }
  Cow::Owned(out)
}

/// Render a parameter bag as `{k=v,...}` over its sorted keys.
pub fn normalize_params(params: &Params, config: &LearningConfig) -> String {
  let fields = params
    .iter()
    .map(|(k, v)| format!("{}={}", escape(k), shape_of(v, config)))
    .collect::<Vec<_>>()
    .join(",");
  format!("{{{fields}}}")
}

/// `tool:{k=v,...}`, one step of a sequence signature.
pub fn step_key(tool_name: &str, params: &Params, config: &LearningConfig) -> String {
  format!("{}:{}", escape(tool_name), normalize_params(params, config))
}

/// `param:tool:k1,k2,...` for a parameter pattern over `common_keys`.
pub fn parameter_signature(tool_name: &str, common_keys: &[String]) -> String {
  let keys = common_keys
    .iter()
    .map(|k| escape(k))
    .collect::<Vec<_>>()
    .join(",");
  format!("param:{}:{keys}", escape(tool_name))
}
