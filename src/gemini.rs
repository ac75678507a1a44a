//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` with a JSON response mime type, and
//! `models` for health checks. Calls are instrumented and log the model, latency and
//! response size (not contents).
//!
//! NOTE: the API key travels as a query parameter; never log request URLs.

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::AppConfig;
use crate::util::trunc_for_log;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_PREVIEW: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
  #[error("GEMINI_API_KEY/GOOGLE_API_KEY not set")]
  NotConfigured,
  #[error("gemini_error status={status} body={message}")]
  Http { status: StatusCode, message: String },
  #[error("gemini_transport: {0}")]
  Transport(String),
  #[error("gemini_invalid_response: {0}")]
  InvalidResponse(String),
  #[error("invalid_model_json: {0}")]
  InvalidJson(String),
}

impl LlmError {
  pub fn is_rate_limited(&self) -> bool {
    matches!(self, LlmError::Http { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
  }
}

impl From<reqwest::Error> for LlmError {
  fn from(e: reqwest::Error) -> Self {
    // reqwest errors can embed the URL, which carries the key.
    LlmError::Transport(e.without_url().to_string())
  }
}

/// Outcome of the models-list health check.
#[derive(Debug)]
pub enum Health {
  Ok,
  AuthError(u16),
  Error(String),
}

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  /// Construct the client if a key is configured; otherwise return None.
  pub fn from_config(cfg: &AppConfig) -> Option<Self> {
    let api_key = cfg.gemini_api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| error!(target: "transcorrect", error = %e, "Failed to build HTTP client"))
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: cfg.gemini_base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
    })
  }

  /// One generateContent round trip; the model's text part is parsed as JSON.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, user_len = user.len()))]
  pub async fn generate_json(&self, system: &str, user: &str) -> Result<Value, LlmError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: system.into() }] },
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: user.into() }] }],
      generation_config: GenerationConfig { response_mime_type: "application/json".into() },
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "transcorrect-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, ERROR_BODY_PREVIEW));
      error!(?status, elapsed = ?start.elapsed(), "Gemini call failed");
      return Err(LlmError::Http { status, message: msg });
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = body.candidates.into_iter().next()
      .and_then(|c| c.content)
      .and_then(|c| c.parts.into_iter().next())
      .map(|p| p.text)
      .ok_or_else(|| LlmError::InvalidResponse("no candidates[0].content.parts[0].text".into()))?;

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    parse_model_json(&text)
  }

  /// List models to verify the key. Never fails; problems are folded into `Health`.
  #[instrument(level = "info", skip(self))]
  pub async fn ping(&self) -> Health {
    let url = format!("{}/models", self.base_url);
    let res = self.client.get(&url)
      .query(&[("key", self.api_key.as_str())])
      .timeout(HEALTH_TIMEOUT)
      .send().await;
    match res {
      Ok(r) if r.status().is_success() => Health::Ok,
      Ok(r) => Health::AuthError(r.status().as_u16()),
      Err(e) => Health::Error(LlmError::from(e).to_string()),
    }
  }
}

/// Models sometimes wrap JSON in a ``` fence even when asked not to.
fn parse_model_json(text: &str) -> Result<Value, LlmError> {
  let trimmed = text.trim();
  let unfenced = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|s| s.strip_suffix("```"))
    .unwrap_or(trimmed);
  serde_json::from_str(unfenced.trim())
    .map_err(|e| LlmError::InvalidJson(format!("{e}; content={}", trunc_for_log(trimmed, ERROR_BODY_PREVIEW))))
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct GenerateRequest {
  system_instruction: Content,
  contents: Vec<Content>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
}
#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}
#[derive(Serialize, Deserialize)]
struct Part { #[serde(default)] text: String }
#[derive(Serialize)]
struct GenerationConfig { response_mime_type: String }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<Content> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Google API error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_and_fenced_json_parse() {
    assert_eq!(parse_model_json(r#"{"a":1}"#).unwrap()["a"], 1);
    assert_eq!(parse_model_json("```json\n{\"a\":2}\n```").unwrap()["a"], 2);
    assert!(matches!(parse_model_json("not json"), Err(LlmError::InvalidJson(_))));
  }

  #[test]
  fn api_error_message_is_extracted() {
    let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("Resource has been exhausted"));
    assert!(extract_api_error("<html>").is_none());
  }

  #[test]
  fn rate_limit_is_recognized() {
    let e = LlmError::Http { status: StatusCode::TOO_MANY_REQUESTS, message: "slow down".into() };
    assert!(e.is_rate_limited());
    assert!(e.to_string().contains("status=429"));
    assert!(!LlmError::NotConfigured.is_rate_limited());
  }

  #[test]
  fn request_uses_gemini_field_names() {
    let req = GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: "sys".into() }] },
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: "hi".into() }] }],
      generation_config: GenerationConfig { response_mime_type: "application/json".into() },
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["system_instruction"]["parts"][0]["text"], "sys");
    assert!(v["system_instruction"].get("role").is_none());
    assert_eq!(v["generationConfig"]["response_mime_type"], "application/json");
  }
}
