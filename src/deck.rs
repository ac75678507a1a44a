//! Flashcard deck generation: request compaction and coercion of the model's deck JSON.

use serde_json::{Map, Value};

use crate::domain::DeckCard;
use crate::protocol::{DeckMakeItem, DeckMakeResponse};
use crate::util::non_empty;

pub const UNNAMED_DECK: &str = "未命名";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeckError {
  #[error("deck_json_invalid_shape")]
  InvalidShape,
  #[error("deck_cards_empty")]
  NoCards,
}

/// Compact JSON sent to the model: empty fields are dropped to save tokens.
pub fn compact_request(name: Option<&str>, items: &[DeckMakeItem]) -> Value {
  let items: Vec<Value> = items
    .iter()
    .map(|it| {
      let mut obj = Map::new();
      let fields = [
        ("zh", &it.zh),
        ("en", &it.en),
        ("corrected", &it.corrected),
        ("span", &it.span),
        ("suggestion", &it.suggestion),
        ("explainZh", &it.explain_zh),
        ("type", &it.kind),
      ];
      for (key, val) in fields {
        if let Some(v) = val.as_deref().filter(|v| !v.is_empty()) {
          obj.insert(key.into(), Value::String(v.into()));
        }
      }
      Value::Object(obj)
    })
    .collect();
  serde_json::json!({
    "name": name.filter(|n| !n.is_empty()).unwrap_or(UNNAMED_DECK),
    "items": items,
  })
}

/// Turn whatever the model produced into a deck, or explain why it cannot.
pub fn coerce_deck(obj: &Value, requested_name: Option<&str>) -> Result<DeckMakeResponse, DeckError> {
  let cards_raw = obj.get("cards").and_then(Value::as_array).ok_or(DeckError::InvalidShape)?;

  let name = non_empty(obj.get("name").and_then(Value::as_str))
    .or_else(|| non_empty(requested_name))
    .unwrap_or_else(|| UNNAMED_DECK.to_string());

  let cards: Vec<DeckCard> = cards_raw.iter().filter_map(coerce_card).collect();
  if cards.is_empty() {
    return Err(DeckError::NoCards);
  }
  Ok(DeckMakeResponse { name, cards })
}

fn coerce_card(c: &Value) -> Option<DeckCard> {
  let field = |keys: &[&str]| {
    keys.iter().find_map(|k| c.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
  };
  let front = non_empty(field(&["front", "zh"]))?;
  let back = non_empty(field(&["back", "en"]))?;
  Some(DeckCard {
    front,
    front_note: non_empty(field(&["frontNote", "front_note"])),
    back,
    back_note: non_empty(field(&["backNote", "back_note"])),
  })
}
