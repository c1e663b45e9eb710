//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` with a single user turn and
//! read back the concatenated text parts. Calls are instrumented and log the
//! model name, latency and response size (not contents).
//!
//! NOTE: We never log the API key; it travels in the `x-goog-api-key` header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Settings;

/// The generative-AI capability the solution cache depends on.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  async fn generate(&self, prompt: &str) -> Result<String, String>;
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  /// Construct the client if an API key is configured; otherwise return None.
  pub fn from_settings(settings: &Settings) -> Option<Self> {
    let api_key = settings.gemini_api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
      model: settings.gemini_model.clone(),
    })
  }
}

#[async_trait]
impl TextGenerator for Gemini {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str) -> Result<String, String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: Some(prompt.to_string()) }] }],
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "examverse-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "Gemini call failed");
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let body: GenerateResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidate_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = response_text(&body)?;
    info!(elapsed = ?start.elapsed(), answer_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

/// Join the text parts of the first candidate. An empty answer is an error:
/// the caller would otherwise persist a blank solution.
fn response_text(body: &GenerateResponse) -> Result<String, String> {
  let candidate = body.candidates.first().ok_or_else(|| match &body.prompt_feedback {
    Some(PromptFeedback { block_reason: Some(reason) }) => format!("Prompt blocked: {}", reason),
    _ => "Gemini returned no candidates".to_string(),
  })?;
  let text: String = candidate
    .content
    .as_ref()
    .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<Vec<_>>().join(""))
    .unwrap_or_default();
  let text = text.trim().to_string();
  if text.is_empty() {
    return Err("Gemini returned an empty answer".into());
  }
  Ok(text)
}

// --- generateContent DTOs ---

#[derive(Serialize)]
struct GenerateRequest {
  contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<Content> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback { #[serde(default)] block_reason: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Google API error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
