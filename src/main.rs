//! ExamVerse · Exam Paper Sharing Backend
//!
//! - Axum HTTP API under /api (papers, AI solutions, summaries, video search, accounts)
//! - Memory or SQLite storage (via DATABASE_URL)
//! - Optional Gemini and YouTube integrations (via environment variables)
//! - Stored PDFs served from /uploads
//!
//! Important env variables:
//!   PORT                : u16 (default 5000)
//!   DATABASE_URL        : "memory" (default) or a sqlite: URL
//!   GEMINI_API_KEY      : enables AI solutions and summaries if present
//!   GEMINI_MODEL        : default "gemini-pro"
//!   YOUTUBE_API_KEY     : enables video search if present
//!   JWT_SECRET          : token signing key (random per process if unset)
//!   UPLOAD_DIR          : default "./uploads"
//!   PROMPTS_CONFIG_PATH : path to TOML prompt overrides
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod accounts;
mod auth;
mod config;
mod domain;
mod error;
mod extract;
mod files;
mod gemini;
mod papers;
mod protocol;
mod routes;
mod solutions;
mod state;
mod store;
mod telemetry;
#[cfg(test)]
mod testutil;
mod util;
mod youtube;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

use crate::config::{load_prompts, Settings};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let prompts = load_prompts(settings.prompts_path.as_deref());

  // Store, upload dir, provider clients.
  let state = Arc::new(AppState::new(&settings, prompts).await?);
  let app = build_router(state, &settings.allowed_origins);

  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  info!(target: "examverse_backend", %addr, origins = ?settings.allowed_origins, "HTTP server listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("failed to serve listener")?;

  info!(target: "examverse_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      error!(target: "examverse_backend", error = %e, "failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!(target: "examverse_backend", error = %e, "failed to install signal handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "examverse_backend", "Shutdown signal received");
}
