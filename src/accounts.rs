//! Account operations: registration, login and the caller's profile.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password};
use crate::domain::{Role, User};
use crate::error::{AppError, AppResult};
use crate::protocol::{AuthOut, LoginIn, RegisterIn, UserOut};
use crate::state::AppState;
use crate::store::{Store, StoreError};
use crate::util::required;

const MIN_PASSWORD_CHARS: usize = 6;
const DUPLICATE_EMAIL: &str = "User already exists with this email";

fn looks_like_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else { return false };
  let Some((host, tld)) = domain.rsplit_once('.') else { return false };
  !local.is_empty()
    && !host.is_empty()
    && tld.len() >= 2
    && tld.chars().all(|c| c.is_ascii_alphabetic())
    && !domain.contains('@')
    && !email.chars().any(char::is_whitespace)
}

#[instrument(level = "info", skip(state, body), fields(role = ?body.role))]
pub async fn register(state: &AppState, body: RegisterIn) -> AppResult<AuthOut> {
  let name = required(body.name.as_deref()).ok_or_else(|| AppError::Validation("Name is required".into()))?;
  let email = required(body.email.as_deref())
    .map(|e| e.to_lowercase())
    .ok_or_else(|| AppError::Validation("Email is required".into()))?;
  if !looks_like_email(&email) {
    return Err(AppError::Validation("Please provide a valid email".into()));
  }
  let password = body
    .password
    .filter(|p| !p.is_empty())
    .ok_or_else(|| AppError::Validation("Password is required".into()))?;
  if password.chars().count() < MIN_PASSWORD_CHARS {
    return Err(AppError::Validation(format!("Password must be at least {MIN_PASSWORD_CHARS} characters")));
  }
  let college_name = required(body.college_name.as_deref())
    .ok_or_else(|| AppError::Validation("College name is required".into()))?;
  let role = match required(body.role.as_deref()) {
    None => Role::default(),
    Some(r) => Role::parse(&r).ok_or_else(|| AppError::Validation("Role must be either student or faculty".into()))?,
  };

  // course/year belong to students only
  let (course, year) = match role {
    Role::Student => (
      Some(required(body.course.as_deref()).ok_or_else(|| AppError::Validation("Course is required".into()))?),
      Some(required(body.year.as_deref()).ok_or_else(|| AppError::Validation("Year is required".into()))?),
    ),
    Role::Faculty => (None, None),
  };

  if state.store.get_user_by_email(&email).await?.is_some() {
    return Err(AppError::Validation(DUPLICATE_EMAIL.into()));
  }

  let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
    .await
    .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))??;

  let user = User {
    id: Uuid::new_v4().to_string(),
    name,
    email,
    password_hash,
    role,
    college_name,
    course,
    year,
    is_verified: true,
    saved_papers: vec![],
    created_at: Utc::now(),
  };
  match state.store.insert_user(user.clone()).await {
    Ok(()) => {}
    // lost a race with a concurrent registration
    Err(StoreError::Duplicate(_)) => return Err(AppError::Validation(DUPLICATE_EMAIL.into())),
    Err(e) => return Err(e.into()),
  }

  let token = issue_token(&user.id, &state.jwt_secret, state.jwt_expires_days)?;
  info!(target: "examverse_backend", user_id = %user.id, role = user.role.as_str(), "User registered");
  Ok(AuthOut { success: true, token, user: user.into() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn login(state: &AppState, body: LoginIn) -> AppResult<AuthOut> {
  let (Some(email), Some(password)) = (required(body.email.as_deref()), body.password.filter(|p| !p.is_empty())) else {
    return Err(AppError::Validation("Please provide email and password".into()));
  };
  let invalid = || AppError::Auth("Invalid credentials".into());

  let user = state.store.get_user_by_email(&email.to_lowercase()).await?.ok_or_else(invalid)?;
  let stored = user.password_hash.clone();
  let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
    .await
    .map_err(|e| AppError::Internal(format!("password check task failed: {e}")))?;
  if !matches {
    return Err(invalid());
  }

  let token = issue_token(&user.id, &state.jwt_secret, state.jwt_expires_days)?;
  info!(target: "examverse_backend", user_id = %user.id, "User logged in");
  Ok(AuthOut { success: true, token, user: user.into() })
}

pub fn me(user: User) -> UserOut {
  user.into()
}
