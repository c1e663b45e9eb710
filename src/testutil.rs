//! Shared fixtures for unit tests: sample records, fake collaborators and a
//! ready-made `AppState` over the in-memory store.

use std::{path::Path, sync::Arc, sync::Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::config::Prompts;
use crate::domain::{ExamType, QuestionPaper, Role, User};
use crate::extract::{HeuristicExtractor, QuestionDraft, QuestionExtractor};
use crate::files::FileStore;
use crate::gemini::TextGenerator;
use crate::state::AppState;
use crate::store::{memory::MemoryStore, StoreType};
use crate::youtube::{Video, VideoSearch};

pub const TEST_SECRET: &str = "test-secret";

pub fn sample_user(id: &str, email: &str, role: Role) -> User {
  let student = role == Role::Student;
  User {
    id: id.into(),
    name: format!("User {id}"),
    email: email.into(),
    password_hash: crate::auth::hash_password("secret123").unwrap(),
    role,
    college_name: "MIT".into(),
    course: student.then(|| "BSc".to_string()),
    year: student.then(|| "2".to_string()),
    is_verified: true,
    saved_papers: vec![],
    created_at: Utc::now(),
  }
}

pub fn sample_paper(id: &str, owner: &str) -> QuestionPaper {
  QuestionPaper {
    id: id.into(),
    title: "Midterm 2023".into(),
    subject: "Physics".into(),
    year: "2023".into(),
    exam_type: ExamType::College,
    college_name: "MIT".into(),
    course: "BSc".into(),
    uploaded_by: owner.into(),
    pdf_url: format!("/uploads/paper-{id}.pdf"),
    pdf_file_name: "midterm.pdf".into(),
    solution_text: String::new(),
    questions: vec![],
    ai_generated_solutions: vec![],
    views: 0,
    downloads: 0,
    upvoted_by: vec![],
    created_at: Utc::now(),
  }
}

/// Generative-AI stand-in: answers with a fixed text (or fails) and records
/// every prompt it was given.
pub struct FakeGenerator {
  reply: Result<String, String>,
  pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
  pub fn answering(answer: &str) -> Arc<Self> {
    Arc::new(Self { reply: Ok(answer.into()), prompts: Mutex::new(vec![]) })
  }

  pub fn failing(message: &str) -> Arc<Self> {
    Arc::new(Self { reply: Err(message.into()), prompts: Mutex::new(vec![]) })
  }

  pub fn last_prompt(&self) -> Option<String> {
    self.prompts.lock().unwrap().last().cloned()
  }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
  async fn generate(&self, prompt: &str) -> Result<String, String> {
    self.prompts.lock().unwrap().push(prompt.to_string());
    self.reply.clone()
  }
}

pub struct FakeVideos(pub Vec<Video>);

#[async_trait]
impl VideoSearch for FakeVideos {
  async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<Video>, String> {
    Ok(self.0.iter().take(max_results as usize).cloned().collect())
  }
}

pub fn sample_video(id: &str) -> Video {
  Video {
    video_id: id.into(),
    title: format!("Video {id}"),
    description: String::new(),
    thumbnail: String::new(),
    channel_title: "Channel".into(),
    published_at: "2024-01-01T00:00:00Z".into(),
    url: format!("https://www.youtube.com/watch?v={id}"),
  }
}

/// Extractor that returns a fixed list regardless of input.
pub struct FixedExtractor(pub Vec<QuestionDraft>);

impl QuestionExtractor for FixedExtractor {
  fn extract(&self, _raw_text: &str) -> Vec<QuestionDraft> {
    self.0.clone()
  }
}

pub fn test_state(upload_dir: &Path) -> AppState {
  AppState {
    store: StoreType::Memory(MemoryStore::new()),
    files: FileStore::new(upload_dir),
    extractor: Arc::new(HeuristicExtractor::new().unwrap()),
    ai: None,
    videos: None,
    prompts: Prompts::default(),
    jwt_secret: TEST_SECRET.into(),
    jwt_expires_days: 30,
  }
}

/// One-page PDF showing `line` in Helvetica, with a correct xref table.
/// `line` must not contain unbalanced parentheses.
pub fn single_line_pdf(line: &str) -> Vec<u8> {
  let content = format!("BT /F1 12 Tf 72 720 Td ({line}) Tj ET");
  let objects = [
    "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
    "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
      .to_string(),
    "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
  ];

  let mut pdf = b"%PDF-1.4\n".to_vec();
  let mut offsets = Vec::with_capacity(objects.len());
  for (i, body) in objects.iter().enumerate() {
    offsets.push(pdf.len());
    pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
  }

  let xref_at = pdf.len();
  let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
  for off in offsets {
    tail.push_str(&format!("{off:010} 00000 n \n"));
  }
  tail.push_str(&format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", objects.len() + 1, xref_at));
  pdf.extend_from_slice(tail.as_bytes());
  pdf
}
