//! Process settings (environment) and prompt templates (optional TOML).
//!
//! Settings are read once at startup into `Settings` and passed down; nothing
//! below `main` touches the environment. See `Prompts` for the TOML schema.

use std::path::PathBuf;

use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use tracing::{error, info, warn};

const DEFAULT_ORIGINS: [&str; 4] = [
  "http://localhost:3000",
  "http://localhost:5500",
  "http://127.0.0.1:5500",
  "http://127.0.0.1:3000",
];

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  /// `memory` or a `sqlite:` URL.
  pub database_url: String,
  pub gemini_api_key: Option<String>,
  pub gemini_base_url: String,
  pub gemini_model: String,
  pub youtube_api_key: Option<String>,
  pub youtube_base_url: String,
  pub allowed_origins: Vec<String>,
  pub jwt_secret: String,
  pub jwt_expires_days: i64,
  pub upload_dir: PathBuf,
  pub prompts_path: Option<String>,
}

impl Settings {
  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build settings from any key lookup; empty values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = get("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(5000);

    let mut allowed_origins: Vec<String> = match get("ALLOWED_ORIGINS") {
      Some(list) => list
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect(),
      None => DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
    };
    if let Some(frontend) = get("FRONTEND_URL") {
      let frontend = frontend.trim_end_matches('/').to_string();
      if !allowed_origins.contains(&frontend) {
        allowed_origins.push(frontend);
      }
    }

    let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
      warn!(target: "examverse_backend", "JWT_SECRET not set; using a random per-process secret (tokens won't survive restarts)");
      rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
    });

    Self {
      port,
      database_url: get("DATABASE_URL").unwrap_or_else(|| "memory".into()),
      gemini_api_key: get("GEMINI_API_KEY"),
      gemini_base_url: get("GEMINI_BASE_URL")
        .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
      gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-pro".into()),
      youtube_api_key: get("YOUTUBE_API_KEY"),
      youtube_base_url: get("YOUTUBE_BASE_URL").unwrap_or_else(|| "https://www.googleapis.com/youtube/v3".into()),
      allowed_origins,
      jwt_secret,
      jwt_expires_days: get("JWT_EXPIRES_DAYS").and_then(|d| d.parse().ok()).filter(|d| *d > 0).unwrap_or(30),
      upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "./uploads".into())),
      prompts_path: get("PROMPTS_CONFIG_PATH"),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates for the generative-AI provider.
/// Placeholders: `{subject}`, `{question}` (solution) and `{subject}`, `{topic}` (summary).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub solution_template: String,
  /// Used for `{subject}` when the caller gives no subject hint.
  pub solution_default_subject: String,
  pub summary_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      solution_template: "You are an expert {subject} tutor. A student has asked the following question from their exam paper:\n\n\
Question: {question}\n\n\
Please provide a detailed, step-by-step solution that:\n\
1. Explains the concept clearly\n\
2. Shows all working steps\n\
3. Provides the final answer\n\
4. Includes any relevant formulas or theories\n\n\
Keep the explanation student-friendly and educational."
        .into(),
      solution_default_subject: "academic".into(),
      summary_template: "Provide a concise summary of the following {subject} topic for exam preparation:\n\n\
Topic: {topic}\n\n\
Include:\n\
- Key concepts\n\
- Important formulas (if applicable)\n\
- Common exam questions\n\
- Quick revision points"
        .into(),
    }
  }
}

/// Load prompt overrides from `path`. On any parsing/IO error, fall back to defaults.
pub fn load_prompts(path: Option<&str>) -> Prompts {
  let Some(path) = path else { return Prompts::default() };
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PromptConfig>(&s) {
      Ok(cfg) => {
        info!(target: "examverse_backend", %path, "Loaded prompt config (TOML)");
        cfg.prompts
      }
      Err(e) => {
        error!(target: "examverse_backend", %path, error = %e, "Failed to parse TOML prompt config; using defaults");
        Prompts::default()
      }
    },
    Err(e) => {
      error!(target: "examverse_backend", %path, error = %e, "Failed to read TOML prompt config; using defaults");
      Prompts::default()
    }
  }
}
