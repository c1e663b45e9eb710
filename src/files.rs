//! Stored PDF files under the upload directory, served at `/uploads/<name>`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const URL_PREFIX: &str = "/uploads/";

#[derive(Clone, Debug)]
pub struct FileStore {
  dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct StoredFile {
  pub file_name: String,
  pub url: String,
  pub path: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub async fn ensure_dir(&self) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&self.dir).await
  }

  /// Write `bytes` under a fresh `paper-<unix millis>-<uuid>.pdf` name.
  pub async fn save_pdf(&self, bytes: &[u8]) -> std::io::Result<StoredFile> {
    let file_name = format!("paper-{}-{}.pdf", Utc::now().timestamp_millis(), Uuid::new_v4().simple());
    let path = self.dir.join(&file_name);
    tokio::fs::write(&path, bytes).await?;
    info!(target: "papers", path = %path.display(), size = bytes.len(), "Stored uploaded PDF");
    Ok(StoredFile { url: format!("{URL_PREFIX}{file_name}"), file_name, path })
  }

  /// Remove the file behind a stored URL. A file that is already gone is fine.
  pub async fn remove(&self, url: &str) -> std::io::Result<()> {
    let Some(path) = self.path_of(url) else {
      warn!(target: "papers", %url, "Not a stored upload URL; nothing to remove");
      return Ok(());
    };
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {
        info!(target: "papers", path = %path.display(), "Removed stored PDF");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(target: "papers", path = %path.display(), "Stored PDF already absent");
        Ok(())
      }
      Err(e) => Err(e),
    }
  }

  // Only plain file names directly under the upload dir resolve.
  fn path_of(&self, url: &str) -> Option<PathBuf> {
    let name = url.strip_prefix(URL_PREFIX)?;
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
      return None;
    }
    Some(self.dir.join(name))
  }
}
