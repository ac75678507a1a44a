//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Grammar correction (model → normalizer, or the offline analyzer)
//!   - Bank listing, random pick, per-tag books and clipboard import
//!   - Progress bookkeeping per device
//!   - Cloud library lookups and deck generation

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::analyzer::simple_analyze;
use crate::bank_parser;
use crate::deck::{coerce_deck, compact_request};
use crate::domain::{BankItem, CorrectResult, ProgressRecord, DIFFICULTY_MAX, DIFFICULTY_MIN};
use crate::error::AppError;
use crate::gemini::LlmError;
use crate::normalize::normalize;
use crate::protocol::*;
use crate::seeds::{cloud_books, cloud_decks};
use crate::state::{device_key, AppState};
use crate::util::{fill_template, trunc_for_log};

const MAX_PAGE: i64 = 200;

//
// Correction
//

#[instrument(level = "info", skip(state, req), fields(zh_len = req.zh.len(), en_len = req.en.len(), linked = req.bank_item_id.is_some()))]
pub async fn correct(state: &AppState, req: &CorrectIn) -> Result<CorrectResult, AppError> {
  let result = if state.config.force_simple_correct {
    debug!(target: "correct", "FORCE_SIMPLE_CORRECT set; skipping model");
    simple_analyze(&req.zh, &req.en)
  } else {
    match correct_with_model(state, &req.zh, &req.en).await {
      Ok(r) => r,
      Err(AppError::Llm(e)) if fallback_allowed(state, &e) => {
        warn!(target: "correct", error = %e, "Model unavailable; using offline analyzer");
        simple_analyze(&req.zh, &req.en)
      }
      Err(e) => return Err(e),
    }
  };

  if let Some(item_id) = req.bank_item_id.as_deref().filter(|s| !s.is_empty()) {
    let device = device_key(req.device_id.as_deref());
    // Best effort: a failed save must not cost the learner their correction.
    if let Err(e) = state
      .record_attempt(&device, item_id, result.score, state.config.bank_complete_min_score)
      .await
    {
      error!(target: "progress", %device, %item_id, error = %e, "Progress update after correct failed");
    }
  }

  info!(target: "correct", score = result.score, errors = result.errors.len(), "Correction served");
  Ok(result)
}

async fn correct_with_model(state: &AppState, zh: &str, en: &str) -> Result<CorrectResult, AppError> {
  let gemini = state.gemini.as_ref().ok_or(LlmError::NotConfigured)?;
  let prompts = &state.config.prompts;
  let user = fill_template(&prompts.correct_user_template, &[("zh", zh), ("en", en)]);
  let raw = gemini.generate_json(&prompts.correct_system, &user).await?;
  Ok(normalize(raw)?)
}

fn fallback_allowed(state: &AppState, e: &LlmError) -> bool {
  state.config.allow_fallback_on_failure
    && (e.is_rate_limited() || matches!(e, LlmError::NotConfigured))
}

#[instrument(level = "info", skip(state))]
pub async fn health(state: &AppState) -> HealthOut {
  use crate::gemini::Health;

  let Some(g) = &state.gemini else {
    return HealthOut { status: "no_key", provider: "gemini", ..Default::default() };
  };
  match g.ping().await {
    Health::Ok => HealthOut { status: "ok", provider: "gemini", model: Some(g.model.clone()), ..Default::default() },
    Health::AuthError(code) => HealthOut { status: "auth_error", provider: "gemini", code: Some(code), ..Default::default() },
    Health::Error(message) => HealthOut { status: "error", provider: "gemini", message: Some(message), ..Default::default() },
  }
}

//
// Bank
//

fn check_difficulty(d: Option<i64>) -> Result<Option<u8>, AppError> {
  let Some(d) = d else { return Ok(None) };
  u8::try_from(d)
    .ok()
    .filter(|d| (DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(d))
    .map(Some)
    .ok_or_else(|| AppError::Validation(format!("difficulty must be between {DIFFICULTY_MIN} and {DIFFICULTY_MAX}")))
}

fn matches_filters(item: &BankItem, difficulty: Option<u8>, tag: Option<&str>) -> bool {
  difficulty.map_or(true, |d| item.difficulty == d)
    && tag.filter(|t| !t.is_empty()).map_or(true, |t| item.tags.iter().any(|x| x == t))
}

fn with_status(item: BankItem, progress: &BTreeMap<String, ProgressRecord>) -> BankItemWithStatus {
  let completed = progress.get(&item.id).is_some_and(|r| r.completed);
  BankItemWithStatus { item, completed }
}

#[instrument(level = "info", skip(state))]
pub async fn bank_items(state: &AppState, q: &BankItemsQuery) -> Result<Vec<BankItemWithStatus>, AppError> {
  if !(1..=MAX_PAGE).contains(&q.limit) {
    return Err(AppError::Validation(format!("limit must be between 1 and {MAX_PAGE}")));
  }
  let offset = usize::try_from(q.offset)
    .map_err(|_| AppError::Validation("offset must be >= 0".into()))?;
  let limit = q.limit as usize;
  let difficulty = check_difficulty(q.difficulty)?;

  let progress = state.progress_for(&device_key(q.device_id.as_deref())).await;
  let items = state
    .bank_snapshot()
    .await
    .into_iter()
    .filter(|it| matches_filters(it, difficulty, q.tag.as_deref()))
    .skip(offset)
    .take(limit)
    .map(|it| with_status(it, &progress))
    .collect();
  Ok(items)
}

#[instrument(level = "info", skip(state))]
pub async fn bank_random(state: &AppState, q: &BankRandomQuery) -> Result<BankItemWithStatus, AppError> {
  let difficulty = check_difficulty(q.difficulty)?;

  let progress = state.progress_for(&device_key(q.device_id.as_deref())).await;
  let candidates: Vec<BankItem> = state
    .bank_snapshot()
    .await
    .into_iter()
    .filter(|it| matches_filters(it, difficulty, q.tag.as_deref()))
    .filter(|it| !q.skip_completed || !progress.get(&it.id).is_some_and(|r| r.completed))
    .collect();

  let pick = candidates
    .choose(&mut rand::thread_rng())
    .cloned()
    .ok_or(AppError::NotFound("no_item"))?;
  Ok(with_status(pick, &progress))
}

/// Group items by tag; untagged items land in "default". Sorted by name.
pub fn books_from(items: &[BankItem]) -> Vec<BankBook> {
  let mut buckets: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
  for it in items {
    if it.tags.is_empty() {
      buckets.entry("default").or_default().push(it.difficulty);
    }
    for t in &it.tags {
      buckets.entry(t.as_str()).or_default().push(it.difficulty);
    }
  }
  buckets
    .into_iter()
    .map(|(name, diffs)| BankBook {
      name: name.to_string(),
      count: diffs.len(),
      difficulty_min: diffs.iter().copied().min().unwrap_or(DIFFICULTY_MIN),
      difficulty_max: diffs.iter().copied().max().unwrap_or(DIFFICULTY_MIN),
    })
    .collect()
}

#[instrument(level = "info", skip(state, req), fields(text_len = req.text.len(), replace = req.replace))]
pub async fn bank_import(state: &AppState, req: &ImportIn) -> ImportOut {
  let parsed = bank_parser::parse(&req.text, req.default_tag.as_deref());
  let imported = parsed.items.len();
  let mut errors = parsed.warnings;

  if let Err(e) = state.import_items(parsed.items, req.replace).await {
    error!(target: "bank", error = %e, "Bank save failed after import");
    errors.push(format!("save_error: {e}"));
  }
  info!(target: "bank", imported, warnings = errors.len(), "Bank import finished");
  ImportOut { imported, errors }
}

//
// Progress
//

pub async fn progress_complete(state: &AppState, req: &ProgressMarkIn) -> Result<ProgressRecordOut, AppError> {
  let device = device_key(req.device_id.as_deref());
  let record = state.mark_progress(&device, &req.item_id, req.score, req.completed).await?;
  Ok(ProgressRecordOut { item_id: req.item_id.clone(), record })
}

pub async fn progress_summary(state: &AppState, q: &ProgressQuery) -> ProgressSummary {
  let device = device_key(q.device_id.as_deref());
  let recs = state.progress_for(&device).await;
  let completed_ids = recs.iter().filter(|(_, r)| r.completed).map(|(id, _)| id.clone()).collect();
  let records = recs
    .into_iter()
    .map(|(item_id, record)| ProgressRecordOut { item_id, record })
    .collect();
  ProgressSummary { device_id: device, completed_ids, records }
}

//
// Cloud library
//

pub fn cloud_deck_list() -> Vec<CloudDeckSummary> {
  cloud_decks()
    .into_iter()
    .map(|d| CloudDeckSummary { id: d.id.into(), name: d.name.into(), count: d.cards.len() })
    .collect()
}

pub fn cloud_deck_detail(id: &str) -> Result<CloudDeckDetail, AppError> {
  let deck = cloud_decks().into_iter().find(|d| d.id == id).ok_or(AppError::NotFound("not_found"))?;
  let cards = deck
    .cards
    .into_iter()
    .map(|c| CloudCardOut {
      id: Uuid::new_v4().to_string(),
      front: c.front,
      back: c.back,
      front_note: c.front_note,
      back_note: c.back_note,
    })
    .collect();
  Ok(CloudDeckDetail { id: deck.id.into(), name: deck.name.into(), cards })
}

pub fn cloud_book_list() -> Vec<CloudBookSummary> {
  cloud_books()
    .into_iter()
    .map(|b| CloudBookSummary { name: b.name.into(), count: b.items.len() })
    .collect()
}

pub fn cloud_book_detail(name: &str) -> Result<CloudBookDetail, AppError> {
  let book = cloud_books().into_iter().find(|b| b.name == name).ok_or(AppError::NotFound("not_found"))?;
  Ok(CloudBookDetail { name: book.name.into(), items: book.items })
}

//
// Deck maker
//

#[instrument(level = "info", skip(state, req), fields(items = req.items.len()))]
pub async fn make_deck(state: &AppState, req: &DeckMakeIn) -> Result<DeckMakeResponse, AppError> {
  let gemini = state.gemini.as_ref().ok_or(LlmError::NotConfigured)?;
  let payload = compact_request(req.name.as_deref(), &req.items);
  let user = payload.to_string();
  let debug_log = state.config.deck_debug_log;

  if debug_log {
    debug!(target: "deck", model = %gemini.model, items_in = req.items.len(), user_content = %trunc_for_log(&user, 2000), "Deck request");
  }
  let obj = match gemini.generate_json(&state.config.prompts.deck_system, &user).await {
    Ok(v) => v,
    Err(e) => {
      if debug_log {
        debug!(target: "deck", error = %e, "Deck model call failed");
      }
      return Err(e.into());
    }
  };

  let deck = coerce_deck(&obj, req.name.as_deref());
  if debug_log {
    match &deck {
      Ok(d) => debug!(target: "deck", cards_parsed = d.cards.len(), name_resolved = %d.name, "Deck parsed"),
      Err(e) => debug!(target: "deck", error = %e, head = %trunc_for_log(&obj.to_string(), 800), "Deck rejected"),
    }
  }
  Ok(deck?)
}
