//! Paper service: listing, retrieval, upload, owner-only update/delete and the
//! engagement operations (downloads, upvotes, saves).
//!
//! Counters and toggles are single store operations; this module never reads
//! a paper, mutates it and writes it back.

use std::collections::HashMap;

use axum::{body::Bytes, extract::Multipart};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::require_faculty;
use crate::domain::{ExamType, PaperFilter, PaperUpdate, Question, QuestionPaper, User};
use crate::error::{AppError, AppResult};
use crate::extract::{pdf_text, QuestionDraft};
use crate::protocol::{PaperOut, PapersQuery, SaveOut, UpdatePaperIn, UploaderOut, UpvoteOut};
use crate::state::AppState;
use crate::store::Store;
use crate::util::{required, trunc_for_log};

pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;
const PDF_MIME: &str = "application/pdf";

#[instrument(level = "info", skip(state, q))]
pub async fn list(state: &AppState, q: PapersQuery) -> AppResult<Vec<PaperOut>> {
  let filter = PaperFilter::new(q.college_name, q.course, q.year, q.subject, q.exam_type, q.search);
  let papers = state.store.list_papers(&filter).await?;

  let mut owner_ids: Vec<String> = papers.iter().map(|p| p.uploaded_by.clone()).collect();
  owner_ids.sort();
  owner_ids.dedup();
  let owners: HashMap<String, User> =
    state.store.get_users(&owner_ids).await?.into_iter().map(|u| (u.id.clone(), u)).collect();

  info!(target: "papers", count = papers.len(), "Papers listed");
  Ok(
    papers
      .into_iter()
      .map(|p| {
        let uploader = owners.get(&p.uploaded_by).map(UploaderOut::brief);
        PaperOut::new(p, uploader)
      })
      .collect(),
  )
}

/// Fetch one paper, counting the view.
#[instrument(level = "info", skip(state))]
pub async fn get(state: &AppState, id: &str) -> AppResult<PaperOut> {
  let paper = state.store.record_view(id).await?.ok_or_else(AppError::paper_not_found)?;
  let uploader = state.store.get_user(&paper.uploaded_by).await?;
  debug!(target: "papers", %id, views = paper.views, "Paper viewed");
  Ok(PaperOut::new(paper, uploader.as_ref().map(UploaderOut::with_college)))
}

pub struct UploadedPdf {
  pub file_name: String,
  pub content_type: Option<String>,
  pub bytes: Bytes,
}

/// Parsed multipart upload body.
#[derive(Default)]
pub struct UploadForm {
  pub title: Option<String>,
  pub subject: Option<String>,
  pub year: Option<String>,
  pub course: Option<String>,
  pub exam_type: Option<String>,
  pub solution_text: Option<String>,
  pub questions: Option<String>,
  pub pdf: Option<UploadedPdf>,
}

impl UploadForm {
  pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
      let name = field.name().unwrap_or_default().to_string();
      if name == "pdf" {
        let file_name = field.file_name().unwrap_or("paper.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        form.pdf = Some(UploadedPdf { file_name, content_type, bytes });
        continue;
      }
      let value = field.text().await?;
      match name.as_str() {
        "title" => form.title = Some(value),
        "subject" => form.subject = Some(value),
        "year" => form.year = Some(value),
        "course" => form.course = Some(value),
        "examType" => form.exam_type = Some(value),
        "solutionText" => form.solution_text = Some(value),
        "questions" => form.questions = Some(value),
        other => debug!(target: "papers", field = %other, "Ignoring unknown upload field"),
      }
    }
    Ok(form)
  }
}

/// Upload entry point. The role is checked before any of the body is read.
pub async fn upload(state: &AppState, user: &User, multipart: Multipart) -> AppResult<PaperOut> {
  require_faculty(user)?;
  let form = UploadForm::read(multipart).await?;
  create(state, user, form).await
}

fn require_field(v: Option<&str>, label: &str) -> AppResult<String> {
  required(v).ok_or_else(|| AppError::Validation(format!("{label} is required")))
}

#[instrument(level = "info", skip(state, user, form), fields(user_id = %user.id))]
pub async fn create(state: &AppState, user: &User, form: UploadForm) -> AppResult<PaperOut> {
  require_faculty(user)?;

  let pdf = form.pdf.ok_or_else(|| AppError::Validation("Please upload a PDF file".into()))?;
  if pdf.content_type.as_deref() != Some(PDF_MIME) {
    return Err(AppError::Validation("Only PDF files are allowed".into()));
  }
  if pdf.bytes.len() > MAX_PDF_BYTES {
    return Err(AppError::PayloadTooLarge("File too large (max 10MB)".into()));
  }

  let title = require_field(form.title.as_deref(), "Title")?;
  let subject = require_field(form.subject.as_deref(), "Subject")?;
  let year = require_field(form.year.as_deref(), "Year")?;
  let course = require_field(form.course.as_deref(), "Course")?;
  let exam_type = match required(form.exam_type.as_deref()) {
    None => ExamType::default(),
    Some(t) => ExamType::parse(&t)
      .ok_or_else(|| AppError::Validation("examType must be either college or competitive".into()))?,
  };

  let stored = state.files.save_pdf(&pdf.bytes).await?;

  let questions = match manual_questions(form.questions.as_deref()) {
    Some(qs) => {
      info!(target: "papers", count = qs.len(), "Using manually supplied questions");
      qs
    }
    None => extract_questions(state, pdf.bytes.clone()).await,
  };

  let paper = QuestionPaper {
    id: Uuid::new_v4().to_string(),
    title,
    subject,
    year,
    exam_type,
    college_name: user.college_name.clone(),
    course,
    uploaded_by: user.id.clone(),
    pdf_url: stored.url.clone(),
    pdf_file_name: pdf.file_name,
    solution_text: form.solution_text.unwrap_or_default(),
    questions,
    ai_generated_solutions: vec![],
    views: 0,
    downloads: 0,
    upvoted_by: vec![],
    created_at: Utc::now(),
  };

  if let Err(e) = state.store.insert_paper(paper.clone()).await {
    if let Err(rm) = state.files.remove(&stored.url).await {
      error!(target: "papers", url = %stored.url, error = %rm, "Failed to remove orphaned upload");
    }
    return Err(e.into());
  }

  info!(target: "papers", id = %paper.id, questions = paper.questions.len(), "Paper uploaded");
  Ok(PaperOut::new(paper, Some(UploaderOut::brief(user))))
}

/// Faculty-supplied questions, if the field holds a non-empty JSON list.
fn manual_questions(raw: Option<&str>) -> Option<Vec<Question>> {
  let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
  let drafts: Vec<QuestionDraft> = match serde_json::from_str(raw) {
    Ok(d) => d,
    Err(e) => {
      warn!(target: "papers", error = %e, "Ignoring malformed questions field");
      return None;
    }
  };
  if drafts.is_empty() {
    return None;
  }
  Some(drafts.into_iter().map(into_question).collect())
}

fn into_question(d: QuestionDraft) -> Question {
  Question::new(d.question_number, d.question_text, d.marks)
}

/// Best-effort: any failure is logged and yields no questions.
async fn extract_questions(state: &AppState, bytes: Bytes) -> Vec<Question> {
  let extractor = state.extractor.clone();
  let outcome = tokio::task::spawn_blocking(move || {
    let text = pdf_text(&bytes)?;
    Ok::<_, String>((text.chars().count(), trunc_for_log(&text, 200), extractor.extract(&text)))
  })
  .await;

  match outcome {
    Ok(Ok((text_len, preview, drafts))) => {
      debug!(target: "papers", text_len, %preview, "Extracted PDF text");
      info!(target: "papers", count = drafts.len(), "Extracted questions from PDF");
      drafts.into_iter().map(into_question).collect()
    }
    Ok(Err(e)) => {
      warn!(target: "papers", error = %e, "PDF text extraction failed; continuing without questions");
      vec![]
    }
    Err(e) => {
      error!(target: "papers", error = %e, "PDF extraction task failed; continuing without questions");
      vec![]
    }
  }
}

/// Load a paper the caller may modify: faculty role, existing record, owner.
async fn owned_paper(state: &AppState, user: &User, id: &str, action: &str) -> AppResult<QuestionPaper> {
  require_faculty(user)?;
  let paper = state.store.get_paper(id).await?.ok_or_else(AppError::paper_not_found)?;
  if !paper.is_owned_by(&user.id) {
    return Err(AppError::Forbidden(format!("Not authorized to {action} this paper")));
  }
  Ok(paper)
}

fn non_blank(v: Option<String>, label: &str) -> AppResult<Option<String>> {
  match v {
    None => Ok(None),
    Some(s) if s.trim().is_empty() => Err(AppError::Validation(format!("{label} cannot be empty"))),
    Some(s) => Ok(Some(s.trim().to_string())),
  }
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(state: &AppState, user: &User, id: &str, body: UpdatePaperIn) -> AppResult<PaperOut> {
  owned_paper(state, user, id, "update").await?;
  let update = PaperUpdate {
    title: non_blank(body.title, "Title")?,
    subject: non_blank(body.subject, "Subject")?,
    year: non_blank(body.year, "Year")?,
    solution_text: body.solution_text,
  };
  let paper = state.store.update_paper(id, &update).await?.ok_or_else(AppError::paper_not_found)?;
  info!(target: "papers", %id, has_faculty_solution = paper.has_faculty_solution(), "Paper updated");
  Ok(PaperOut::new(paper, Some(UploaderOut::brief(user))))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn delete(state: &AppState, user: &User, id: &str) -> AppResult<()> {
  let paper = owned_paper(state, user, id, "delete").await?;
  state.files.remove(&paper.pdf_url).await?;
  if !state.store.delete_paper(id).await? {
    return Err(AppError::paper_not_found());
  }
  info!(target: "papers", %id, "Paper deleted");
  Ok(())
}

#[instrument(level = "info", skip(state))]
pub async fn download(state: &AppState, id: &str) -> AppResult<u64> {
  state.store.increment_downloads(id).await?.ok_or_else(AppError::paper_not_found)
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn toggle_upvote(state: &AppState, user: &User, id: &str) -> AppResult<UpvoteOut> {
  let s = state.store.toggle_upvote(id, &user.id).await?.ok_or_else(AppError::paper_not_found)?;
  debug!(target: "papers", %id, upvotes = s.upvotes, has_upvoted = s.has_upvoted, "Upvote toggled");
  Ok(UpvoteOut { success: true, upvotes: s.upvotes, has_upvoted: s.has_upvoted })
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn toggle_save(state: &AppState, user: &User, id: &str) -> AppResult<SaveOut> {
  let s = state
    .store
    .toggle_saved_paper(&user.id, id)
    .await?
    .ok_or_else(|| AppError::Auth("Not authorized, user not found".into()))?;
  Ok(SaveOut { success: true, is_saved: s.is_saved, saved_papers: s.saved_papers })
}
