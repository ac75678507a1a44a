//! Transcorrect · translation practice backend
//!
//! - Axum HTTP API for the mobile client
//! - Gemini-backed correction with a strict response normalizer
//! - Practice bank + per-device progress persisted as JSON documents
//!
//! Important env variables:
//!   HOST / PORT               : bind address (default 0.0.0.0:8080)
//!   GEMINI_API_KEY            : enables Gemini (GOOGLE_API_KEY also accepted)
//!   GEMINI_BASE_URL           : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL              : default "gemini-2.5-flash" (LLM_MODEL also accepted)
//!   DATA_DIR                  : where bank.json / progress.json live (default ".")
//!   FORCE_SIMPLE_CORRECT      : always use the offline analyzer
//!   ALLOW_FALLBACK_ON_FAILURE : offline analyzer on 429 or missing key
//!   BANK_COMPLETE_MIN_SCORE   : score that marks a linked bank item completed
//!   PROMPTS_CONFIG_PATH       : TOML file with a [prompts] table
//!   PROMPT_FILE / DECK_PROMPT_FILE : system prompt overrides
//!   LOG_LEVEL                 : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod seeds;
mod store;
mod state;
mod protocol;
mod error;
mod normalize;
mod bank_parser;
mod analyzer;
mod deck;
mod gemini;
mod logic;
mod routes;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::from_env()?;
  let addr = config.bind_addr();

  // Shared state: config, Gemini client, bank + progress documents.
  let state = Arc::new(AppState::from_config(config)?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  let listener = TcpListener::bind(&addr).await?;
  info!(target: "transcorrect", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
