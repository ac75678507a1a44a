//! Runtime configuration: environment variables, optional `.env`, prompt overrides.
//!
//! Environment:
//!   HOST / PORT                  : bind address (default 0.0.0.0:8080)
//!   GEMINI_API_KEY               : enables the model (GOOGLE_API_KEY also accepted)
//!   GEMINI_BASE_URL              : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL / LLM_MODEL     : default "gemini-2.5-flash"
//!   DATA_DIR                     : where bank.json / progress.json live (default ".")
//!   FORCE_SIMPLE_CORRECT         : always use the offline analyzer
//!   ALLOW_FALLBACK_ON_FAILURE    : use the offline analyzer when the model is rate limited or off
//!   BANK_COMPLETE_MIN_SCORE      : minimum score that marks a bank item completed (default 0)
//!   DECK_DEBUG_LOG               : log deck prompts/responses at debug level (default on)
//!   PROMPTS_CONFIG_PATH          : TOML file with a [prompts] table
//!   PROMPT_FILE / DECK_PROMPT_FILE : plain-text system prompt overrides

use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("invalid {key}: {message}")]
  Invalid { key: &'static str, message: String },
  #[error("failed to read {path}: {message}")]
  File { path: String, message: String },
  #[error("prompt file {0} is empty")]
  EmptyPrompt(String),
}

#[derive(Clone, Debug, Deserialize, Default)]
struct PromptsFile {
  #[serde(default)]
  prompts: PromptOverrides,
}

#[derive(Clone, Debug, Deserialize, Default)]
struct PromptOverrides {
  correct_system: Option<String>,
  correct_user_template: Option<String>,
  deck_system: Option<String>,
}

/// Prompts sent to the model. Defaults are compiled in; see module docs for overrides.
#[derive(Clone, Debug)]
pub struct Prompts {
  pub correct_system: String,
  /// `{zh}` and `{en}` are substituted.
  pub correct_user_template: String,
  pub deck_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      correct_system: concat!(
        "You are an English writing tutor for Chinese speakers. The learner gives a Chinese sentence (zh) ",
        "and their English translation (en). Correct the English.\n",
        "Respond ONLY with JSON: {\"corrected\": string, \"score\": integer 0-100, \"errors\": [",
        "{\"span\": string, \"type\": one of morphological|syntactic|lexical|phonological|pragmatic, ",
        "\"explainZh\": string (Traditional Chinese), \"suggestion\": string, ",
        "\"hints\": {\"before\": string, \"after\": string, \"occurrence\": integer >= 1}}]}.\n",
        "`span` must be copied verbatim from en. Do not output ids or ranges."
      )
      .into(),
      correct_user_template: "請批改以下內容並輸出 JSON。\nzh: {zh}\nen: {en}\n".into(),
      deck_system: concat!(
        "You turn a learner's corrected mistakes into flashcards. Input is JSON {name, items[]}. ",
        "Respond ONLY with JSON {\"name\": string, \"cards\": [{\"front\": Chinese prompt, ",
        "\"frontNote\": optional string, \"back\": natural English, \"backNote\": optional string}]}. ",
        "One card per useful item; skip items with nothing to learn."
      )
      .into(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub host: String,
  pub port: u16,
  pub gemini_api_key: Option<String>,
  pub gemini_base_url: String,
  pub model: String,
  pub data_dir: PathBuf,
  pub force_simple_correct: bool,
  pub allow_fallback_on_failure: bool,
  pub bank_complete_min_score: i64,
  pub deck_debug_log: bool,
  pub prompts: Prompts,
}

impl AppConfig {
  /// Load `.env` (best effort) and read the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    let _ = dotenvy::dotenv();
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build from an arbitrary key lookup; lets tests avoid touching the real environment.
  pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = match var("PORT") {
      Some(p) => p.parse::<u16>().map_err(|e| ConfigError::Invalid { key: "PORT", message: e.to_string() })?,
      None => 8080,
    };
    let bank_complete_min_score = var("BANK_COMPLETE_MIN_SCORE")
      .and_then(|v| v.parse::<i64>().ok())
      .unwrap_or(0);

    let prompts = load_prompts(&var)?;

    Ok(Self {
      host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
      port,
      gemini_api_key: var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")),
      gemini_base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE.into()),
      model: var("GEMINI_MODEL").or_else(|| var("LLM_MODEL")).unwrap_or_else(|| DEFAULT_MODEL.into()),
      data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
      force_simple_correct: var("FORCE_SIMPLE_CORRECT").is_some_and(|v| truthy(&v)),
      allow_fallback_on_failure: var("ALLOW_FALLBACK_ON_FAILURE").is_some_and(|v| truthy(&v)),
      bank_complete_min_score,
      deck_debug_log: var("DECK_DEBUG_LOG").map_or(true, |v| truthy(&v)),
      prompts,
    })
  }

  pub fn bind_addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn bank_path(&self) -> PathBuf {
    self.data_dir.join("bank.json")
  }

  pub fn progress_path(&self) -> PathBuf {
    self.data_dir.join("progress.json")
  }
}

fn truthy(v: &str) -> bool {
  matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Defaults, then the TOML table, then the plain-text prompt files (highest precedence).
fn load_prompts(var: &dyn Fn(&str) -> Option<String>) -> Result<Prompts, ConfigError> {
  let mut prompts = Prompts::default();

  if let Some(path) = var("PROMPTS_CONFIG_PATH") {
    let raw = read_file(&path)?;
    let parsed: PromptsFile = toml::from_str(&raw)
      .map_err(|e| ConfigError::File { path: path.clone(), message: e.to_string() })?;
    let o = parsed.prompts;
    if let Some(s) = o.correct_system { prompts.correct_system = s; }
    if let Some(s) = o.correct_user_template { prompts.correct_user_template = s; }
    if let Some(s) = o.deck_system { prompts.deck_system = s; }
    info!(target: "transcorrect", %path, "Loaded prompt overrides (TOML)");
  }

  if let Some(path) = var("PROMPT_FILE") {
    prompts.correct_system = read_prompt_file(&path)?;
    info!(target: "transcorrect", %path, "Loaded correction prompt file");
  }
  if let Some(path) = var("DECK_PROMPT_FILE") {
    prompts.deck_system = read_prompt_file(&path)?;
    info!(target: "transcorrect", %path, "Loaded deck prompt file");
  }
  Ok(prompts)
}

fn read_file(path: &str) -> Result<String, ConfigError> {
  std::fs::read_to_string(path).map_err(|e| ConfigError::File { path: path.into(), message: e.to_string() })
}

fn read_prompt_file(path: &str) -> Result<String, ConfigError> {
  let content = read_file(path)?.trim().to_string();
  if content.is_empty() {
    return Err(ConfigError::EmptyPrompt(path.into()));
  }
  Ok(content)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn defaults_without_environment() {
    let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    assert!(cfg.gemini_api_key.is_none());
    assert_eq!(cfg.model, DEFAULT_MODEL);
    assert!(!cfg.force_simple_correct);
    assert!(cfg.deck_debug_log);
    assert_eq!(cfg.bank_complete_min_score, 0);
    assert_eq!(cfg.bank_path(), PathBuf::from("./bank.json"));
  }

  #[test]
  fn reads_keys_models_and_flags() {
    let cfg = AppConfig::from_lookup(lookup(&[
      ("GOOGLE_API_KEY", "k"),
      ("LLM_MODEL", "generic"),
      ("PORT", "9000"),
      ("FORCE_SIMPLE_CORRECT", "Yes"),
      ("ALLOW_FALLBACK_ON_FAILURE", "0"),
      ("BANK_COMPLETE_MIN_SCORE", "nope"),
      ("DECK_DEBUG_LOG", "off"),
    ]))
    .unwrap();
    assert_eq!(cfg.gemini_api_key.as_deref(), Some("k"));
    assert_eq!(cfg.model, "generic");
    assert_eq!(cfg.port, 9000);
    assert!(cfg.force_simple_correct);
    assert!(!cfg.allow_fallback_on_failure);
    assert_eq!(cfg.bank_complete_min_score, 0);
    assert!(!cfg.deck_debug_log);

    let cfg = AppConfig::from_lookup(lookup(&[("GEMINI_MODEL", "specific"), ("LLM_MODEL", "generic")])).unwrap();
    assert_eq!(cfg.model, "specific");
  }

  #[test]
  fn bad_port_is_an_error() {
    assert!(matches!(
      AppConfig::from_lookup(lookup(&[("PORT", "eighty")])),
      Err(ConfigError::Invalid { key: "PORT", .. })
    ));
  }

  #[test]
  fn prompt_files_override_toml() {
    let dir = tempfile::tempdir().unwrap();
    let toml_path = dir.path().join("prompts.toml");
    std::fs::write(&toml_path, "[prompts]\ncorrect_system = \"from toml\"\ndeck_system = \"deck toml\"\n").unwrap();
    let txt_path = dir.path().join("prompt.txt");
    std::fs::write(&txt_path, "  from file \n").unwrap();

    let cfg = AppConfig::from_lookup(lookup(&[
      ("PROMPTS_CONFIG_PATH", toml_path.to_str().unwrap()),
      ("PROMPT_FILE", txt_path.to_str().unwrap()),
    ]))
    .unwrap();
    assert_eq!(cfg.prompts.correct_system, "from file");
    assert_eq!(cfg.prompts.deck_system, "deck toml");
    assert!(cfg.prompts.correct_user_template.contains("{zh}"));
  }

  #[test]
  fn empty_or_missing_prompt_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.txt");
    std::fs::write(&empty, "   \n").unwrap();
    assert!(matches!(
      AppConfig::from_lookup(lookup(&[("DECK_PROMPT_FILE", empty.to_str().unwrap())])),
      Err(ConfigError::EmptyPrompt(_))
    ));
    assert!(matches!(
      AppConfig::from_lookup(lookup(&[("PROMPT_FILE", "/definitely/not/here.txt")])),
      Err(ConfigError::File { .. })
    ));
  }
}
