//! YouTube Data API search client (video suggestions for a topic).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Settings;

pub const DEFAULT_MAX_RESULTS: u32 = 3;
// API ceiling for search.list
const MAX_RESULTS_CAP: u32 = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
  pub video_id: String,
  pub title: String,
  pub description: String,
  pub thumbnail: String,
  pub channel_title: String,
  pub published_at: String,
  pub url: String,
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
  async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Video>, String>;
}

pub fn clamp_max_results(requested: Option<u32>) -> u32 {
  requested.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, MAX_RESULTS_CAP)
}

#[derive(Clone)]
pub struct YouTube {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
}

impl YouTube {
  pub fn from_settings(settings: &Settings) -> Option<Self> {
    let api_key = settings.youtube_api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;
    Some(Self { client, api_key, base_url: settings.youtube_base_url.trim_end_matches('/').to_string() })
  }
}

#[async_trait]
impl VideoSearch for YouTube {
  #[instrument(level = "info", skip(self, query), fields(query_len = query.len()))]
  async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Video>, String> {
    let url = format!("{}/search", self.base_url);
    let max = max_results.to_string();
    let res = self.client.get(&url)
      .header(USER_AGENT, "examverse-backend/0.1")
      .query(&[
        ("part", "snippet"),
        ("q", query),
        ("type", "video"),
        ("maxResults", max.as_str()),
        ("key", self.api_key.as_str()),
        ("relevanceLanguage", "en"),
        ("safeSearch", "strict"),
      ])
      .send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_google_error(&body).unwrap_or(body);
      return Err(format!("YouTube HTTP {}: {}", status, msg));
    }

    let body: SearchResponse = res.json().await.map_err(|e| e.to_string())?;
    let videos = to_videos(body);
    info!(count = videos.len(), "YouTube search returned");
    Ok(videos)
  }
}

fn to_videos(body: SearchResponse) -> Vec<Video> {
  body
    .items
    .into_iter()
    .filter_map(|item| {
      let video_id = item.id.video_id?;
      let s = item.snippet;
      Some(Video {
        url: format!("https://www.youtube.com/watch?v={}", video_id),
        video_id,
        title: s.title,
        description: s.description,
        thumbnail: s.thumbnails.medium.map(|t| t.url).unwrap_or_default(),
        channel_title: s.channel_title,
        published_at: s.published_at,
      })
    })
    .collect()
}

// --- search.list DTOs ---

#[derive(Deserialize)]
struct SearchResponse { #[serde(default)] items: Vec<SearchItem> }
#[derive(Deserialize)]
struct SearchItem { id: ItemId, snippet: Snippet }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId { #[serde(default)] video_id: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
  #[serde(default)] title: String,
  #[serde(default)] description: String,
  #[serde(default)] channel_title: String,
  #[serde(default)] published_at: String,
  #[serde(default)] thumbnails: Thumbnails,
}
#[derive(Deserialize, Default)]
struct Thumbnails { #[serde(default)] medium: Option<Thumbnail> }
#[derive(Deserialize)]
struct Thumbnail { url: String }

fn extract_google_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
