//! Authentication: JWT issuance/verification, password hashing and the
//! bearer-token middleware that resolves the calling user.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::header::AUTHORIZATION,
  middleware::Next,
  response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::Store;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String, // user id
  pub exp: usize,
  pub iat: usize,
}

pub fn issue_token(user_id: &str, secret: &str, expires_days: i64) -> AppResult<String> {
  let now = Utc::now();
  let claims = Claims {
    sub: user_id.to_string(),
    exp: (now + Duration::days(expires_days)).timestamp() as usize,
    iat: now.timestamp() as usize,
  };
  encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
    .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

/// Decode and validate (signature + expiry) a token, returning its subject.
pub fn verify_token(token: &str, secret: &str) -> AppResult<String> {
  decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
    .map(|data| data.claims.sub)
    .map_err(|e| {
      debug!(target: "examverse_backend", error = %e, "Rejected token");
      AppError::Auth("Not authorized, token failed".into())
    })
}

/// bcrypt hash (`$2b$<cost>$...`, salt included).
pub fn hash_password(password: &str) -> AppResult<String> {
  bcrypt::hash(password, HASH_COST).map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

/// False on mismatch and on a stored value that is not a bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
  bcrypt::verify(password, stored).unwrap_or_else(|e| {
    debug!(target: "examverse_backend", error = %e, "Unreadable password hash");
    false
  })
}

/// The authenticated caller, placed in request extensions by `authorize`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Role gate for faculty-only operations.
pub fn require_faculty(user: &User) -> AppResult<()> {
  if user.is_faculty() {
    Ok(())
  } else {
    Err(AppError::Forbidden(format!(
      "User role '{}' is not authorized to access this route",
      user.role.as_str()
    )))
  }
}

/// Bearer-token middleware: verifies the JWT and loads the user it names.
pub async fn authorize(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Result<Response, AppError> {
  let token = req
    .headers()
    .get(AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .and_then(|h| h.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| AppError::Auth("Not authorized, no token".into()))?;

  let user_id = verify_token(token, &state.jwt_secret)?;
  let user = state
    .store
    .get_user(&user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Not authorized, user not found".into()))?;

  req.extensions_mut().insert(CurrentUser(user));
  Ok(next.run(req).await)
}
