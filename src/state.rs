//! Application state: storage backend, upload directory, prompts and the
//! optional external collaborators (generative AI, video search).
//!
//! This module owns:
//!   - the identity + paper store (memory or SQLite, picked by DATABASE_URL)
//!   - the stored-file directory
//!   - the question extractor used on upload
//!   - the prompts struct (from TOML or defaults)
//!   - optional Gemini and YouTube clients
//!
//! Missing API keys leave the collaborator unset; the operations that need it
//! then fail with an upstream error instead of the process refusing to start.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::config::{Prompts, Settings};
use crate::extract::{HeuristicExtractor, QuestionExtractor};
use crate::files::FileStore;
use crate::gemini::{Gemini, TextGenerator};
use crate::store::StoreType;
use crate::youtube::{VideoSearch, YouTube};

pub struct AppState {
    pub store: StoreType,
    pub files: FileStore,
    pub extractor: Arc<dyn QuestionExtractor>,
    pub ai: Option<Arc<dyn TextGenerator>>,
    pub videos: Option<Arc<dyn VideoSearch>>,
    pub prompts: Prompts,
    pub jwt_secret: String,
    pub jwt_expires_days: i64,
}

impl AppState {
    /// Build state from settings: connect the store, prepare the upload dir,
    /// init the provider clients.
    #[instrument(level = "info", skip_all, fields(database = %settings.database_url))]
    pub async fn new(settings: &Settings, prompts: Prompts) -> anyhow::Result<Self> {
        let store = StoreType::connect(&settings.database_url)
            .await
            .with_context(|| format!("failed to open store at {}", settings.database_url))?;

        let files = FileStore::new(&settings.upload_dir);
        files
            .ensure_dir()
            .await
            .with_context(|| format!("failed to create upload dir {}", settings.upload_dir.display()))?;

        let extractor = HeuristicExtractor::new().context("failed to compile question patterns")?;

        let ai: Option<Arc<dyn TextGenerator>> = match Gemini::from_settings(settings) {
            Some(g) => {
                info!(target: "ai", model = %g.model, base_url = %g.base_url, "Gemini client initialized");
                Some(Arc::new(g))
            }
            None => {
                warn!(target: "ai", "GEMINI_API_KEY not set; AI solution endpoints will fail");
                None
            }
        };
        let videos: Option<Arc<dyn VideoSearch>> = match YouTube::from_settings(settings) {
            Some(y) => {
                info!(target: "ai", base_url = %y.base_url, "YouTube client initialized");
                Some(Arc::new(y))
            }
            None => {
                warn!(target: "ai", "YOUTUBE_API_KEY not set; video search will fail");
                None
            }
        };

        info!(
            target: "examverse_backend",
            backend = store.backend(),
            upload_dir = %files.dir().display(),
            "App state initialized"
        );

        Ok(Self {
            store,
            files,
            extractor: Arc::new(extractor),
            ai,
            videos,
            prompts,
            jwt_secret: settings.jwt_secret.clone(),
            jwt_expires_days: settings.jwt_expires_days,
        })
    }
}
