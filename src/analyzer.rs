//! Offline rule-based corrector, used when the model is bypassed or unavailable.
//!
//! It only knows a handful of classic learner mistakes. Each rule fires at most once
//! and rewrites the first match in the corrected text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{CorrectResult, CorrectionError, ErrorCategory, ErrorHints};

const SCORE_START: i64 = 100;
const SCORE_FLOOR: i64 = 60;
const PENALTY_PER_ERROR: i64 = 5;

static YESTERDAY: Lazy<Regex> = Lazy::new(|| word(r"(?i)\byesterday\b"));
static GO: Lazy<Regex> = Lazy::new(|| word(r"\bgo\b"));
static SHOP: Lazy<Regex> = Lazy::new(|| word(r"(?i)\bshop\b"));
static FRUITS: Lazy<Regex> = Lazy::new(|| word(r"(?i)\bfruits\b"));

fn word(pattern: &str) -> Regex {
  // Patterns are literals above; a failure here is a programming error.
  Regex::new(pattern).expect("static analyzer pattern")
}

/// Apply the built-in rules to the English attempt. `zh` is accepted for parity with
/// the model path but the rules only look at English.
#[instrument(level = "info", skip_all, fields(zh_len = zh.len(), en_len = en.len()))]
pub fn simple_analyze(zh: &str, en: &str) -> CorrectResult {
  let mut corrected = en.to_string();
  let mut errors = Vec::new();

  if YESTERDAY.is_match(en) && GO.is_match(en) {
    errors.push(error(
      "go",
      ErrorCategory::Morphological,
      "應使用過去式。",
      "went",
      ErrorHints { before: Some("I ".into()), after: Some(" to".into()), occurrence: Some(1) },
    ));
    corrected = GO.replace(&corrected, "went").into_owned();
  }

  if SHOP.is_match(en) {
    errors.push(error(
      "shop",
      ErrorCategory::Lexical,
      "在此語境更常用 store。",
      "store",
      ErrorHints { before: Some("the ".into()), after: Some(" ".into()), occurrence: None },
    ));
    corrected = SHOP.replace(&corrected, "store").into_owned();
  }

  if FRUITS.is_match(en) {
    errors.push(error(
      "fruits",
      ErrorCategory::Pragmatic,
      "一般泛指時常用不可數名詞 fruit。",
      "fruit",
      ErrorHints { before: Some("some ".into()), after: None, occurrence: None },
    ));
    corrected = FRUITS.replace(&corrected, "fruit").into_owned();
  }

  let score = score_for(errors.len());
  debug!(target: "correct", errors = errors.len(), score, "Simple analyzer finished");
  CorrectResult { corrected, score, errors }
}

fn score_for(errors: usize) -> i64 {
  let penalty = PENALTY_PER_ERROR.saturating_mul(errors as i64);
  (SCORE_START - penalty).max(SCORE_FLOOR)
}

fn error(span: &str, kind: ErrorCategory, explanation: &str, suggestion: &str, hints: ErrorHints) -> CorrectionError {
  CorrectionError {
    id: Uuid::new_v4().to_string(),
    span: span.into(),
    kind,
    explanation: explanation.into(),
    suggestion: Some(suggestion.into()),
    hints: Some(hints),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn all_three_rules_fire() {
    let r = simple_analyze("我昨天去商店買了一些水果", "Yesterday I go to the shop and buy some fruits");
    assert_eq!(r.corrected, "Yesterday I went to the store and buy some fruit");
    let kinds: Vec<_> = r.errors.iter().map(|e| e.kind).collect();
    assert_eq!(
      kinds,
      vec![ErrorCategory::Morphological, ErrorCategory::Lexical, ErrorCategory::Pragmatic]
    );
    assert_eq!(r.score, 85);
  }

  #[test]
  fn clean_sentence_scores_full() {
    let r = simple_analyze("", "I went home.");
    assert!(r.errors.is_empty());
    assert_eq!(r.score, 100);
    assert_eq!(r.corrected, "I went home.");
  }

  #[test]
  fn go_needs_yesterday_and_exact_case() {
    assert!(simple_analyze("", "I go to school").errors.is_empty());
    assert!(simple_analyze("", "yesterday Go home").errors.is_empty());
  }

  #[test]
  fn only_first_match_is_rewritten() {
    let r = simple_analyze("", "Shop at the shop");
    assert_eq!(r.corrected, "store at the shop");
    assert_eq!(r.errors.len(), 1);
  }

  #[test]
  fn score_never_drops_below_floor() {
    assert_eq!(score_for(0), 100);
    assert_eq!(score_for(3), 85);
    assert_eq!(score_for(20), 60);
  }
}
