//! Domain models used by the backend: correction results, bank items, progress records.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// The closed set of grammar-error categories used everywhere in the app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
  Morphological,
  Syntactic,
  Lexical,
  Phonological,
  Pragmatic,
}

impl ErrorCategory {
  pub const ALL: [ErrorCategory; 5] = [
    ErrorCategory::Morphological,
    ErrorCategory::Syntactic,
    ErrorCategory::Lexical,
    ErrorCategory::Phonological,
    ErrorCategory::Pragmatic,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCategory::Morphological => "morphological",
      ErrorCategory::Syntactic => "syntactic",
      ErrorCategory::Lexical => "lexical",
      ErrorCategory::Phonological => "phonological",
      ErrorCategory::Pragmatic => "pragmatic",
    }
  }

  /// Canonical names in alphabetical order (the shape reported to clients on rejection).
  pub fn allowed_sorted() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Self::ALL.iter().map(|c| c.as_str()).collect();
    names.sort_unstable();
    names
  }
}

impl fmt::Display for ErrorCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Exact match against the canonical lowercase names. Callers fold case first.
impl FromStr for ErrorCategory {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL.iter().copied().find(|c| c.as_str() == s).ok_or(())
  }
}

/// Context that lets a client locate `span` inside the original text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHints {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub before: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub after: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub occurrence: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionError {
  pub id: String,
  pub span: String,
  #[serde(rename = "type")]
  pub kind: ErrorCategory,
  #[serde(rename = "explainZh", alias = "explanation")]
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hints: Option<ErrorHints>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectResult {
  pub corrected: String,
  #[serde(deserialize_with = "integral_score")]
  pub score: i64,
  pub errors: Vec<CorrectionError>,
}

/// Models occasionally emit `85.0`; whole floats are accepted, fractional ones are not.
fn integral_score<'de, D>(d: D) -> Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  let n = serde_json::Number::deserialize(d)?;
  if let Some(i) = n.as_i64() {
    return Ok(i);
  }
  match n.as_f64() {
    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
    _ => Err(de::Error::custom(format!("score must be an integer, got {n}"))),
  }
}

//
// Bank
//

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankHint {
  pub category: ErrorCategory,
  pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSuggestion {
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

pub const DIFFICULTY_MIN: u8 = 1;
pub const DIFFICULTY_MAX: u8 = 5;
pub const DIFFICULTY_DEFAULT: u8 = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BankItemError {
  #[error("prompt text is empty")]
  EmptyPrompt,
  #[error("hint {index} has empty text")]
  EmptyHint { index: usize },
  #[error("difficulty {0} outside 1..=5")]
  Difficulty(u8),
}

/// One practice prompt. `zh` is the sentence or topic the learner translates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankItem {
  pub id: String,
  pub zh: String,
  #[serde(default)]
  pub hints: Vec<BankHint>,
  #[serde(default)]
  pub suggestions: Vec<BankSuggestion>,
  #[serde(default)]
  pub tags: Vec<String>,
  pub difficulty: u8,
}

impl BankItem {
  /// Validating constructor; the id is generated fresh.
  pub fn new(
    zh: String,
    hints: Vec<BankHint>,
    tags: Vec<String>,
    difficulty: u8,
  ) -> Result<Self, BankItemError> {
    if zh.trim().is_empty() {
      return Err(BankItemError::EmptyPrompt);
    }
    if let Some(index) = hints.iter().position(|h| h.text.trim().is_empty()) {
      return Err(BankItemError::EmptyHint { index });
    }
    if !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&difficulty) {
      return Err(BankItemError::Difficulty(difficulty));
    }
    Ok(Self {
      id: uuid::Uuid::new_v4().to_string(),
      zh,
      hints,
      suggestions: Vec::new(),
      tags,
      difficulty,
    })
  }
}

//
// Progress (per device, per bank item)
//

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub attempts: u32,
  #[serde(default)]
  pub last_score: Option<i64>,
  /// Seconds since the Unix epoch.
  #[serde(default = "now_epoch_secs")]
  pub updated_at: f64,
}

impl Default for ProgressRecord {
  fn default() -> Self {
    Self { completed: false, attempts: 0, last_score: None, updated_at: now_epoch_secs() }
  }
}

pub fn now_epoch_secs() -> f64 {
  chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

//
// Cloud library (curated, read-only)
//

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCard {
  pub front: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub front_note: Option<String>,
  pub back: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub back_note: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CloudDeck {
  pub id: &'static str,
  pub name: &'static str,
  pub cards: Vec<DeckCard>,
}

#[derive(Clone, Debug)]
pub struct CloudBook {
  pub name: &'static str,
  pub items: Vec<BankItem>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allowed_names_are_sorted() {
    assert_eq!(
      ErrorCategory::allowed_sorted(),
      vec!["lexical", "morphological", "phonological", "pragmatic", "syntactic"]
    );
  }

  #[test]
  fn bank_item_rejects_blank_hint() {
    let hints = vec![
      BankHint { category: ErrorCategory::Lexical, text: "ok".into() },
      BankHint { category: ErrorCategory::Syntactic, text: "  ".into() },
    ];
    let err = BankItem::new("測試".into(), hints, vec![], 2).unwrap_err();
    assert_eq!(err, BankItemError::EmptyHint { index: 1 });
  }

  #[test]
  fn bank_item_ids_are_fresh() {
    let a = BankItem::new("x".into(), vec![], vec![], 3).unwrap();
    let b = BankItem::new("x".into(), vec![], vec![], 3).unwrap();
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn correction_error_accepts_either_explanation_key() {
    let raw = serde_json::json!({
      "id": "x", "span": "go", "type": "lexical", "explanation": "because"
    });
    let e: CorrectionError = serde_json::from_value(raw).unwrap();
    assert_eq!(e.explanation, "because");
    let out = serde_json::to_value(&e).unwrap();
    assert_eq!(out["explainZh"], "because");
    assert!(out.get("suggestion").is_none());
  }
}
