//! Public request/response DTOs for the HTTP API (serde ready).
//! Field names follow the mobile client (camelCase on the wire).

use serde::{Deserialize, Serialize};

use crate::domain::{BankItem, DeckCard, ProgressRecord};

//
// Correction
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectIn {
    pub zh: String,
    pub en: String,
    /// Links the attempt to a bank item for progress tracking.
    #[serde(default)]
    pub bank_item_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct HealthOut {
    pub status: &'static str,
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

//
// Cloud library
//

#[derive(Debug, Serialize)]
pub struct CloudDeckSummary {
    pub id: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCardOut {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CloudDeckDetail {
    pub id: String,
    pub name: String,
    pub cards: Vec<CloudCardOut>,
}

#[derive(Debug, Serialize)]
pub struct CloudBookSummary {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CloudBookDetail {
    pub name: String,
    pub items: Vec<BankItem>,
}

//
// Bank
//

fn default_limit() -> i64 {
    20
}

/// Numeric params are signed so out-of-range values reach validation instead of
/// failing extraction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankItemsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub difficulty: Option<i64>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRandomQuery {
    #[serde(default)]
    pub difficulty: Option<i64>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub skip_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct BankItemWithStatus {
    #[serde(flatten)]
    pub item: BankItem,
    pub completed: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankBook {
    pub name: String,
    pub count: usize,
    pub difficulty_min: u8,
    pub difficulty_max: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIn {
    pub text: String,
    #[serde(default)]
    pub default_tag: Option<String>,
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportOut {
    pub imported: usize,
    pub errors: Vec<String>,
}

//
// Progress
//

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMarkIn {
    pub item_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default = "default_true")]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecordOut {
    pub item_id: String,
    #[serde(flatten)]
    pub record: ProgressRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub device_id: String,
    pub completed_ids: Vec<String>,
    pub records: Vec<ProgressRecordOut>,
}

//
// Deck maker
//

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeckMakeItem {
    #[serde(default)]
    pub zh: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
    #[serde(default)]
    pub corrected: Option<String>,
    #[serde(default)]
    pub span: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default, rename = "explainZh")]
    pub explain_zh: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeckMakeIn {
    #[serde(default)]
    pub name: Option<String>,
    pub items: Vec<DeckMakeItem>,
}

#[derive(Debug, Serialize)]
pub struct DeckMakeResponse {
    pub name: String,
    pub cards: Vec<DeckCard>,
}
