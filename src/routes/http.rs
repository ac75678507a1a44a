//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures render through `AppError`.

use std::sync::Arc;
use axum::{extract::{rejection::QueryRejection, Path, Query, State}, Json};
use tracing::{info, instrument};

use crate::domain::CorrectResult;
use crate::error::AppError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(logic::health(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(zh_len = body.zh.len(), en_len = body.en.len()))]
pub async fn http_post_correct(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CorrectIn>,
) -> Result<Json<CorrectResult>, AppError> {
  Ok(Json(logic::correct(&state, &body).await?))
}

//
// Cloud library
//

#[instrument(level = "info")]
pub async fn http_cloud_decks() -> Json<Vec<CloudDeckSummary>> {
  Json(logic::cloud_deck_list())
}

#[instrument(level = "info")]
pub async fn http_cloud_deck(Path(deck_id): Path<String>) -> Result<Json<CloudDeckDetail>, AppError> {
  Ok(Json(logic::cloud_deck_detail(&deck_id)?))
}

#[instrument(level = "info")]
pub async fn http_cloud_books() -> Json<Vec<CloudBookSummary>> {
  Json(logic::cloud_book_list())
}

#[instrument(level = "info")]
pub async fn http_cloud_book(Path(name): Path<String>) -> Result<Json<CloudBookDetail>, AppError> {
  Ok(Json(logic::cloud_book_detail(&name)?))
}

//
// Bank
//

#[instrument(level = "info", skip(state))]
pub async fn http_bank_items(
  State(state): State<Arc<AppState>>,
  query: Result<Query<BankItemsQuery>, QueryRejection>,
) -> Result<Json<Vec<BankItemWithStatus>>, AppError> {
  let Query(q) = query?;
  let items = logic::bank_items(&state, &q).await?;
  info!(target: "bank", returned = items.len(), "Bank items served");
  Ok(Json(items))
}

#[instrument(level = "info", skip(state))]
pub async fn http_bank_random(
  State(state): State<Arc<AppState>>,
  query: Result<Query<BankRandomQuery>, QueryRejection>,
) -> Result<Json<BankItemWithStatus>, AppError> {
  let Query(q) = query?;
  let item = logic::bank_random(&state, &q).await?;
  info!(target: "bank", id = %item.item.id, "Random bank item served");
  Ok(Json(item))
}

#[instrument(level = "info", skip(state))]
pub async fn http_bank_books(State(state): State<Arc<AppState>>) -> Json<Vec<BankBook>> {
  Json(logic::books_from(&state.bank_snapshot().await))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_bank_import(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ImportIn>,
) -> Json<ImportOut> {
  Json(logic::bank_import(&state, &body).await)
}

//
// Progress
//

#[instrument(level = "info", skip(state, body), fields(item_id = %body.item_id))]
pub async fn http_progress_complete(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProgressMarkIn>,
) -> Result<Json<ProgressRecordOut>, AppError> {
  Ok(Json(logic::progress_complete(&state, &body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_progress(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ProgressQuery>,
) -> Json<ProgressSummary> {
  Json(logic::progress_summary(&state, &q).await)
}

//
// Deck maker
//

#[instrument(level = "info", skip(state, body), fields(items = body.items.len()))]
pub async fn http_make_deck(
  State(state): State<Arc<AppState>>,
  Json(body): Json<DeckMakeIn>,
) -> Result<Json<DeckMakeResponse>, AppError> {
  Ok(Json(logic::make_deck(&state, &body).await?))
}
