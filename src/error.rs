//! Error taxonomy and the uniform JSON failure envelope.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl below is
//! the single place where failures become HTTP responses.

use axum::{
  extract::{
    multipart::{MultipartError, MultipartRejection},
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
  /// Missing/invalid request field, malformed body.
  #[error("{0}")]
  Validation(String),

  /// Missing, invalid or expired credentials.
  #[error("{0}")]
  Auth(String),

  /// Role or ownership mismatch.
  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  PayloadTooLarge(String),

  /// Failure of the generative-AI or video provider.
  #[error("{message}: {detail}")]
  Upstream { message: String, detail: String },

  #[error("storage error: {0}")]
  Storage(#[from] StoreError),

  #[error("{0}")]
  Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
  pub fn upstream(message: impl Into<String>, detail: impl Into<String>) -> Self {
    AppError::Upstream { message: message.into(), detail: detail.into() }
  }

  pub fn paper_not_found() -> Self {
    AppError::NotFound("Question paper not found".into())
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      AppError::Upstream { .. } | AppError::Storage(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

#[derive(Serialize)]
struct ErrorBody {
  success: bool,
  message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      AppError::Upstream { message, detail } => {
        error!(target: "examverse_backend", %message, %detail, "Upstream provider failure");
        ErrorBody { success: false, message: message.clone(), error: Some(detail.clone()) }
      }
      AppError::Storage(e) => {
        error!(target: "examverse_backend", error = %e, "Storage failure");
        ErrorBody { success: false, message: "Server Error".into(), error: None }
      }
      AppError::Internal(msg) => {
        error!(target: "examverse_backend", error = %msg, "Internal failure");
        ErrorBody { success: false, message: "Server Error".into(), error: None }
      }
      other => {
        warn!(target: "examverse_backend", status = status.as_u16(), message = %other, "Request rejected");
        ErrorBody { success: false, message: other.to_string(), error: None }
      }
    };
    (status, Json(body)).into_response()
  }
}

impl From<JsonRejection> for AppError {
  fn from(rejection: JsonRejection) -> Self {
    AppError::Validation(rejection.body_text())
  }
}

impl From<MultipartRejection> for AppError {
  fn from(rejection: MultipartRejection) -> Self {
    AppError::Validation(rejection.body_text())
  }
}

impl From<PathRejection> for AppError {
  fn from(rejection: PathRejection) -> Self {
    AppError::Validation(rejection.body_text())
  }
}

impl From<MultipartError> for AppError {
  fn from(e: MultipartError) -> Self {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
      AppError::PayloadTooLarge("File too large (max 10MB)".into())
    } else {
      AppError::Validation(e.body_text())
    }
  }
}

impl From<std::io::Error> for AppError {
  fn from(e: std::io::Error) -> Self {
    AppError::Internal(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_mapping() {
    assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::paper_not_found().status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::upstream("a", "b").status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn upstream_envelope_carries_provider_message() {
    let resp = AppError::upstream("Failed to generate AI solution. Please try again.", "quota exceeded")
      .into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["success"], false);
    assert_eq!(v["error"], "quota exceeded");
  }
}
