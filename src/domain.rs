//! Domain models: users, question papers, embedded questions and AI solutions.
//!
//! Derived values (`upvotes`, `has_faculty_solution`) are methods over their
//! source fields, so they cannot drift from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Student,
  Faculty,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Student => "student",
      Role::Faculty => "faculty",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "student" => Some(Role::Student),
      "faculty" => Some(Role::Faculty),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
  #[default]
  College,
  Competitive,
}

impl ExamType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExamType::College => "college",
      ExamType::Competitive => "competitive",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "college" => Some(ExamType::College),
      "competitive" => Some(ExamType::Competitive),
      _ => None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct User {
  pub id: String,
  pub name: String,
  /// Lowercased and trimmed on registration.
  pub email: String,
  pub password_hash: String,
  pub role: Role,
  pub college_name: String,
  // student only
  pub course: Option<String>,
  pub year: Option<String>,
  pub is_verified: bool,
  pub saved_papers: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn is_faculty(&self) -> bool {
    self.role == Role::Faculty
  }
}

/// An answer attached to an embedded question. Only constructible in the
/// generated state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSolution {
  pub answer: String,
  pub generated_at: DateTime<Utc>,
  is_generated: bool,
}

impl AiSolution {
  pub fn generated(answer: String, at: DateTime<Utc>) -> Self {
    Self { answer, generated_at: at, is_generated: true }
  }

  pub fn is_generated(&self) -> bool {
    self.is_generated
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(default)]
  pub question_number: Option<u32>,
  #[serde(default)]
  pub question_text: String,
  #[serde(default)]
  pub marks: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ai_solution: Option<AiSolution>,
}

impl Question {
  pub fn new(number: Option<u32>, text: String, marks: Option<u32>) -> Self {
    Self { question_number: number, question_text: text, marks, ai_solution: None }
  }
}

/// Entry of a paper's ad-hoc (free-text) solution log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHocSolution {
  pub question: String,
  pub answer: String,
  pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct QuestionPaper {
  pub id: String,
  pub title: String,
  pub subject: String,
  pub year: String,
  pub exam_type: ExamType,
  pub college_name: String,
  pub course: String,
  pub uploaded_by: String,
  pub pdf_url: String,
  pub pdf_file_name: String,
  pub solution_text: String,
  pub questions: Vec<Question>,
  pub ai_generated_solutions: Vec<AdHocSolution>,
  pub views: u64,
  pub downloads: u64,
  pub upvoted_by: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl QuestionPaper {
  pub fn has_faculty_solution(&self) -> bool {
    !self.solution_text.is_empty()
  }

  pub fn upvotes(&self) -> u64 {
    self.upvoted_by.len() as u64
  }

  pub fn is_owned_by(&self, user_id: &str) -> bool {
    self.uploaded_by == user_id
  }

  pub fn apply(&mut self, update: &PaperUpdate) {
    if let Some(t) = &update.title { self.title = t.clone(); }
    if let Some(s) = &update.subject { self.subject = s.clone(); }
    if let Some(y) = &update.year { self.year = y.clone(); }
    if let Some(s) = &update.solution_text { self.solution_text = s.clone(); }
  }
}

/// The mutable subset of a paper. Absent fields keep their current value.
#[derive(Clone, Debug, Default)]
pub struct PaperUpdate {
  pub title: Option<String>,
  pub subject: Option<String>,
  pub year: Option<String>,
  pub solution_text: Option<String>,
}

/// Listing filters. Empty strings are normalized to `None` by `PaperFilter::new`.
#[derive(Clone, Debug, Default)]
pub struct PaperFilter {
  pub college_name: Option<String>,
  pub course: Option<String>,
  pub year: Option<String>,
  pub subject: Option<String>,
  pub exam_type: Option<String>,
  pub search: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
  v.filter(|s| !s.trim().is_empty())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl PaperFilter {
  pub fn new(
    college_name: Option<String>,
    course: Option<String>,
    year: Option<String>,
    subject: Option<String>,
    exam_type: Option<String>,
    search: Option<String>,
  ) -> Self {
    Self {
      college_name: non_empty(college_name),
      course: non_empty(course),
      year: non_empty(year),
      subject: non_empty(subject),
      exam_type: non_empty(exam_type),
      search: non_empty(search),
    }
  }

  pub fn matches(&self, p: &QuestionPaper) -> bool {
    if let Some(c) = &self.college_name { if &p.college_name != c { return false; } }
    if let Some(c) = &self.course { if &p.course != c { return false; } }
    if let Some(y) = &self.year { if &p.year != y { return false; } }
    if let Some(s) = &self.subject { if !contains_ci(&p.subject, s) { return false; } }
    if let Some(e) = &self.exam_type { if p.exam_type.as_str() != e { return false; } }
    if let Some(q) = &self.search {
      if !contains_ci(&p.title, q) && !contains_ci(&p.subject, q) { return false; }
    }
    true
  }
}
