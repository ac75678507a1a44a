//! Trust boundary between raw model JSON and the typed `CorrectResult`.
//!
//! The model is asked for `{corrected, score, errors[]}` but nothing it returns is
//! trusted as-is:
//! - every `errors[i].type` must fold (trim + lowercase) into `ErrorCategory`;
//!   one bad category rejects the whole result and all offenders are reported
//! - range fields left over from older prompts are stripped
//! - error ids are always minted here

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::{CorrectResult, ErrorCategory};

const RANGE_KEYS: [&str; 3] = ["originalRange", "suggestionRange", "correctedRange"];

/// One rejected category, reported by its position in `errors`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvalidType {
  pub index: usize,
  pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
  #[error("invalid error types: {}", describe(.invalid))]
  InvalidErrorType {
    invalid: Vec<InvalidType>,
    allowed: Vec<&'static str>,
  },
  #[error("malformed correction result: {0}")]
  MalformedResult(String),
}

fn describe(invalid: &[InvalidType]) -> String {
  invalid
    .iter()
    .map(|i| format!("#{}={:?}", i.index, i.value))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Validate and coerce a raw model response into a `CorrectResult`.
#[instrument(level = "debug", skip(raw))]
pub fn normalize(raw: Value) -> Result<CorrectResult, NormalizeError> {
  let mut obj = match raw {
    Value::Object(map) => map,
    other => {
      return Err(NormalizeError::MalformedResult(format!(
        "expected a JSON object, got {}",
        json_kind(&other)
      )))
    }
  };

  let mut errors = match obj.remove("errors") {
    None | Some(Value::Null) => Vec::new(),
    Some(Value::Array(items)) => items,
    Some(other) => {
      return Err(NormalizeError::MalformedResult(format!(
        "`errors` must be an array, got {}",
        json_kind(&other)
      )))
    }
  };

  let mut invalid = Vec::new();
  for (index, entry) in errors.iter_mut().enumerate() {
    // A non-object entry has no type at all; it is reported like a missing one.
    let Value::Object(err) = entry else {
      invalid.push(InvalidType { index, value: String::new() });
      continue;
    };

    let folded = folded_type(err.get("type"));
    match folded.parse::<ErrorCategory>() {
      Ok(cat) => {
        err.insert("type".into(), Value::String(cat.as_str().into()));
      }
      Err(()) => invalid.push(InvalidType { index, value: folded }),
    }

    for key in RANGE_KEYS {
      err.remove(key);
    }
    // Both spellings present would trip the serde alias; a usable `explainZh` wins,
    // a null one yields to `explanation`.
    let shadowed = match err.get("explainZh") {
      Some(Value::Null) => Some("explainZh"),
      Some(Value::String(_)) => Some("explanation"),
      _ => None,
    };
    if let Some(key) = shadowed {
      err.remove(key);
    }
    err.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
  }

  if !invalid.is_empty() {
    warn!(target: "correct", invalid = %describe(&invalid), "Model returned unknown error categories");
    return Err(NormalizeError::InvalidErrorType {
      invalid,
      allowed: ErrorCategory::allowed_sorted(),
    });
  }

  obj.insert("errors".into(), Value::Array(errors));
  let result: CorrectResult = serde_json::from_value(Value::Object(obj))
    .map_err(|e| NormalizeError::MalformedResult(e.to_string()))?;
  check_hints(&result)?;

  debug!(target: "correct", errors = result.errors.len(), score = result.score, "Normalized model response");
  Ok(result)
}

/// `type` as the model sent it, trimmed and lowercased. Missing or null folds to "".
fn folded_type(v: Option<&Value>) -> String {
  match v {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.trim().to_lowercase(),
    Some(other) => other.to_string().to_lowercase(),
  }
}

fn check_hints(result: &CorrectResult) -> Result<(), NormalizeError> {
  for (i, e) in result.errors.iter().enumerate() {
    if let Some(0) = e.hints.as_ref().and_then(|h| h.occurrence) {
      return Err(NormalizeError::MalformedResult(format!(
        "errors[{i}].hints.occurrence must be >= 1"
      )));
    }
  }
  Ok(())
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Client-facing payload for a rejected category set.
#[derive(Debug, Serialize)]
pub struct InvalidTypesDetail<'a> {
  pub invalid_types: &'a [InvalidType],
  pub allowed: &'a [&'static str],
}
