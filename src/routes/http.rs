//! HTTP endpoint handlers. These are thin wrappers that forward to the services.
//! Each handler is instrumented; request bodies are never logged.

use std::sync::Arc;

use axum::{
  extract::{
    multipart::MultipartRejection,
    rejection::{JsonRejection, PathRejection},
    Multipart, Path, Query, State,
  },
  http::StatusCode,
  response::IntoResponse,
  Extension, Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::auth::{require_faculty, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::protocol::*;
use crate::state::AppState;
use crate::{accounts, papers, solutions};

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { success: true, message: "ExamVerse API is running", timestamp: Utc::now() })
}

pub async fn http_not_found() -> AppError {
  AppError::NotFound("Route not found".into())
}

// ---------- accounts ----------

#[instrument(level = "info", skip_all)]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  body: Result<Json<RegisterIn>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
  let Json(body) = body?;
  let out = accounts::register(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip_all)]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  body: Result<Json<LoginIn>, JsonRejection>,
) -> AppResult<Json<AuthOut>> {
  let Json(body) = body?;
  Ok(Json(accounts::login(&state, body).await?))
}

#[instrument(level = "info", skip_all, fields(user_id = %user.id))]
pub async fn http_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserEnvelope> {
  Json(UserEnvelope { success: true, user: accounts::me(user) })
}

// ---------- papers ----------

#[instrument(level = "info", skip_all)]
pub async fn http_list_papers(
  State(state): State<Arc<AppState>>,
  Query(q): Query<PapersQuery>,
) -> AppResult<Json<PaperListOut>> {
  let papers = papers::list(&state, q).await?;
  Ok(Json(PaperListOut { success: true, count: papers.len(), papers }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_paper(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> AppResult<Json<PaperEnvelope>> {
  let paper = papers::get(&state, &id).await?;
  Ok(Json(PaperEnvelope { success: true, message: None, paper }))
}

/// The role check runs before the multipart body is looked at, so students
/// are refused whatever they send.
#[instrument(level = "info", skip_all, fields(user_id = %user.id))]
pub async fn http_upload_paper(
  State(state): State<Arc<AppState>>,
  Extension(CurrentUser(user)): Extension<CurrentUser>,
  multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
  require_faculty(&user)?;
  let paper = papers::upload(&state, &user, multipart?).await?;
  Ok((
    StatusCode::CREATED,
    Json(PaperEnvelope { success: true, message: Some("Question paper uploaded successfully".into()), paper }),
  ))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id))]
pub async fn http_update_paper(
  State(state): State<Arc<AppState>>,
  Extension(CurrentUser(user)): Extension<CurrentUser>,
  Path(id): Path<String>,
  body: Result<Json<UpdatePaperIn>, JsonRejection>,
) -> AppResult<Json<PaperEnvelope>> {
  require_faculty(&user)?;
  let Json(body) = body?;
  let paper = papers::update(&state, &user, &id, body).await?;
  Ok(Json(PaperEnvelope { success: true, message: Some("Paper updated successfully".into()), paper }))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_delete_paper(
  State(state): State<Arc<AppState>>,
  Extension(CurrentUser(user)): Extension<CurrentUser>,
  Path(id): Path<String>,
) -> AppResult<Json<MessageOut>> {
  papers::delete(&state, &user, &id).await?;
  Ok(Json(MessageOut { success: true, message: "Paper deleted successfully".into() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_download_paper(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> AppResult<Json<DownloadOut>> {
  let downloads = papers::download(&state, &id).await?;
  info!(target: "papers", %id, downloads, "Download counted");
  Ok(Json(DownloadOut { success: true, downloads }))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_upvote_paper(
  State(state): State<Arc<AppState>>,
  Extension(CurrentUser(user)): Extension<CurrentUser>,
  Path(id): Path<String>,
) -> AppResult<Json<UpvoteOut>> {
  Ok(Json(papers::toggle_upvote(&state, &user, &id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_save_paper(
  State(state): State<Arc<AppState>>,
  Extension(CurrentUser(user)): Extension<CurrentUser>,
  Path(id): Path<String>,
) -> AppResult<Json<SaveOut>> {
  Ok(Json(papers::toggle_save(&state, &user, &id).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_solve_question(
  State(state): State<Arc<AppState>>,
  path: Result<Path<(String, u32)>, PathRejection>,
) -> AppResult<Json<QuestionSolutionOut>> {
  let Path((id, number)) = path?;
  Ok(Json(solutions::solve_question(&state, &id, number).await?))
}

// ---------- AI + video ----------

#[instrument(level = "info", skip_all)]
pub async fn http_generate_solution(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GenerateSolutionIn>, JsonRejection>,
) -> AppResult<Json<GenerateSolutionOut>> {
  let Json(body) = body?;
  Ok(Json(solutions::generate_solution(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_saved_solutions(
  State(state): State<Arc<AppState>>,
  Path(paper_id): Path<String>,
) -> AppResult<Json<SolutionsOut>> {
  let solutions = solutions::saved_solutions(&state, &paper_id).await?;
  Ok(Json(SolutionsOut { success: true, solutions }))
}

#[instrument(level = "info", skip_all)]
pub async fn http_summarize(
  State(state): State<Arc<AppState>>,
  body: Result<Json<SummarizeIn>, JsonRejection>,
) -> AppResult<Json<SummarizeOut>> {
  let Json(body) = body?;
  Ok(Json(solutions::summarize(&state, body).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_search_videos(
  State(state): State<Arc<AppState>>,
  body: Result<Json<VideoSearchIn>, JsonRejection>,
) -> AppResult<Json<VideoSearchOut>> {
  let Json(body) = body?;
  Ok(Json(solutions::search_videos(&state, body).await?))
}
