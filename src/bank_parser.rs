//! Clipboard-friendly plain-text parser for practice items.
//!
//! Blocks are separated by blank lines. Recognized labels per block:
//!
//! ```text
//! ZH: / 中文: / 題: / 句:        prompt text (unlabelled lines continue it)
//! DIFF: / 難: / 難度:            1..=5, default 2
//! TAGS: / TAG: / 標: / 標籤:     comma or `；` separated
//! HINTS: / 提示:                 following `- label: text` or `- text` lines
//! ```
//!
//! Latin labels are case-insensitive; either `:` or `：` ends a label.
//! The parser never fails: anything it cannot use becomes a warning.

use tracing::{debug, instrument};

use crate::domain::{BankHint, BankItem, ErrorCategory, DIFFICULTY_DEFAULT, DIFFICULTY_MAX, DIFFICULTY_MIN};

const WARNING_PREVIEW_CHARS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
  Prompt,
  Difficulty,
  Tags,
  Hints,
}

const FIELD_LABELS: &[(&str, Field)] = &[
  ("ZH", Field::Prompt),
  ("中文", Field::Prompt),
  ("題", Field::Prompt),
  ("题", Field::Prompt),
  ("句", Field::Prompt),
  ("DIFF", Field::Difficulty),
  ("難", Field::Difficulty),
  ("難度", Field::Difficulty),
  ("难度", Field::Difficulty),
  ("TAGS", Field::Tags),
  ("TAG", Field::Tags),
  ("標", Field::Tags),
  ("標籤", Field::Tags),
  ("标签", Field::Tags),
  ("HINTS", Field::Hints),
  ("提示", Field::Hints),
];

/// Exact hint labels, checked before the substring keywords below.
const HINT_ALIASES: &[(&[&str], ErrorCategory)] = &[
  (
    &["morphological", "morphology", "morph", "tense", "plural", "singular", "agreement", "grammar"],
    ErrorCategory::Morphological,
  ),
  (
    &["syntactic", "syntax", "structure", "order", "article", "preposition"],
    ErrorCategory::Syntactic,
  ),
  (
    &["lexical", "lexicon", "word", "wording", "collocation", "idiom", "choice"],
    ErrorCategory::Lexical,
  ),
  (&["phonological", "phonology", "spelling", "pronunciation"], ErrorCategory::Phonological),
  (
    &["pragmatic", "usage", "register", "tone", "politeness", "style"],
    ErrorCategory::Pragmatic,
  ),
];

const HINT_KEYWORDS: &[(&[&str], ErrorCategory)] = &[
  (&["morph", "tense", "plural", "agreement", "grammar", "語法", "时态", "時態"], ErrorCategory::Morphological),
  (&["synta", "structure", "order", "article", "preposition", "句型", "結構", "结构"], ErrorCategory::Syntactic),
  (&["lexic", "word", "collocation", "idiom", "搭配", "用詞", "用词"], ErrorCategory::Lexical),
  (&["phono", "spelling", "pronunciation", "拼寫", "拼写", "發音", "发音"], ErrorCategory::Phonological),
  (&["pragma", "usage", "register", "tone", "polite", "style", "語氣", "语气", "語用"], ErrorCategory::Pragmatic),
];

/// Result of one parse: whatever items could be built plus everything that could not.
#[derive(Debug, Default)]
pub struct ParseOutcome {
  pub items: Vec<BankItem>,
  pub warnings: Vec<String>,
}

#[derive(Default)]
struct Block {
  prompt: Option<String>,
  difficulty: Option<String>,
  tags: Vec<String>,
  hints: Vec<BankHint>,
  in_hints: bool,
}

/// Parse pasted study material. `default_tag` is appended to every item that lacks it.
#[instrument(level = "info", skip_all, fields(text_len = text.len(), has_default_tag = default_tag.is_some()))]
pub fn parse(text: &str, default_tag: Option<&str>) -> ParseOutcome {
  let default_tag = default_tag.map(str::trim).filter(|t| !t.is_empty());
  let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

  let mut out = ParseOutcome::default();
  let mut cur = Block::default();

  for raw in normalized.split('\n') {
    let line = raw.trim();
    if line.is_empty() {
      finish(std::mem::take(&mut cur), default_tag, &mut out);
      continue;
    }

    if cur.in_hints && line.starts_with('-') {
      cur.hints.push(parse_hint(line));
      continue;
    }

    if let Some((field, value)) = split_field(line) {
      match field {
        Field::Prompt => cur.prompt = Some(value.to_string()),
        Field::Difficulty => cur.difficulty = Some(value.to_string()),
        Field::Tags => cur.tags = split_tags(value),
        Field::Hints => cur.in_hints = true,
      }
      continue;
    }

    match cur.prompt.as_mut() {
      Some(prompt) => {
        prompt.push(' ');
        prompt.push_str(line);
      }
      None => {
        let preview: String = line.chars().take(WARNING_PREVIEW_CHARS).collect();
        out.warnings.push(format!("unrecognized_line: {preview}"));
      }
    }
  }
  finish(cur, default_tag, &mut out);

  debug!(target: "bank", items = out.items.len(), warnings = out.warnings.len(), "Parsed bank text");
  out
}

fn finish(block: Block, default_tag: Option<&str>, out: &mut ParseOutcome) {
  let Some(prompt) = block.prompt.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
    return;
  };

  let difficulty = block
    .difficulty
    .as_deref()
    .and_then(|d| d.trim().parse::<i64>().ok())
    .filter(|d| (i64::from(DIFFICULTY_MIN)..=i64::from(DIFFICULTY_MAX)).contains(d))
    .map(|d| d as u8)
    .unwrap_or(DIFFICULTY_DEFAULT);

  let mut tags = block.tags;
  if let Some(tag) = default_tag {
    if !tags.iter().any(|t| t == tag) {
      tags.push(tag.to_string());
    }
  }

  match BankItem::new(prompt, block.hints, tags, difficulty) {
    Ok(item) => out.items.push(item),
    Err(e) => out.warnings.push(format!("invalid_item: {e}")),
  }
}

/// Split `LABEL: value` when LABEL is one of the known field labels.
fn split_field(line: &str) -> Option<(Field, &str)> {
  let (label, value) = split_once_colon(line)?;
  let label = label.trim();
  let upper = label.to_ascii_uppercase();
  FIELD_LABELS
    .iter()
    .find(|(name, _)| *name == upper)
    .map(|(_, field)| (*field, value.trim()))
}

/// Split at the first ASCII or fullwidth colon, whichever comes first.
fn split_once_colon(s: &str) -> Option<(&str, &str)> {
  let (idx, ch) = s.char_indices().find(|(_, c)| *c == ':' || *c == '：')?;
  Some((&s[..idx], &s[idx + ch.len_utf8()..]))
}

fn split_tags(value: &str) -> Vec<String> {
  value
    .split([',', '，', '；'])
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_string)
    .collect()
}

fn parse_hint(line: &str) -> BankHint {
  let body = line.trim_start_matches(['-', ' ']);
  match split_once_colon(body) {
    Some((label, text)) => BankHint {
      category: map_hint_label(label),
      text: text.trim().to_string(),
    },
    None => BankHint { category: ErrorCategory::Lexical, text: body.trim().to_string() },
  }
}

/// Best-effort mapping of a free-text hint label onto the five categories.
pub fn map_hint_label(label: &str) -> ErrorCategory {
  let label = label.trim().to_lowercase();
  if let Some((_, cat)) = HINT_ALIASES.iter().find(|(names, _)| names.contains(&label.as_str())) {
    return *cat;
  }
  HINT_KEYWORDS
    .iter()
    .find(|(keys, _)| keys.iter().any(|k| label.contains(k)))
    .map(|(_, cat)| *cat)
    .unwrap_or(ErrorCategory::Lexical)
}
