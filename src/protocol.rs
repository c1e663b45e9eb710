//! Public protocol structs for the HTTP API (serde ready).
//! Field names are camelCase and record ids go out as `_id`, which is what
//! the frontend reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AdHocSolution, ExamType, Question, QuestionPaper, Role, User};
use crate::youtube::Video;

// ---------- papers ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PapersQuery {
    pub college_name: Option<String>,
    pub course: Option<String>,
    pub year: Option<String>,
    pub subject: Option<String>,
    pub exam_type: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaperIn {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub year: Option<String>,
    pub solution_text: Option<String>,
}

/// The uploader as embedded in a paper: the populated profile when the user
/// still resolves, otherwise the bare id.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploaderRef {
    User(UploaderOut),
    Id(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploaderOut {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college_name: Option<String>,
}

impl UploaderOut {
    pub fn brief(u: &User) -> Self {
        Self { id: u.id.clone(), name: u.name.clone(), email: u.email.clone(), college_name: None }
    }

    pub fn with_college(u: &User) -> Self {
        Self { college_name: Some(u.college_name.clone()), ..Self::brief(u) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperOut {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub subject: String,
    pub year: String,
    pub exam_type: ExamType,
    pub college_name: String,
    pub course: String,
    pub uploaded_by: UploaderRef,
    #[serde(rename = "pdfURL")]
    pub pdf_url: String,
    pub pdf_file_name: String,
    pub solution_text: String,
    pub has_faculty_solution: bool,
    pub questions: Vec<Question>,
    pub ai_generated_solutions: Vec<AdHocSolution>,
    pub views: u64,
    pub downloads: u64,
    pub upvotes: u64,
    pub upvoted_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PaperOut {
    pub fn new(p: QuestionPaper, uploader: Option<UploaderOut>) -> Self {
        let has_faculty_solution = p.has_faculty_solution();
        let upvotes = p.upvotes();
        let uploaded_by = match uploader {
            Some(u) => UploaderRef::User(u),
            None => UploaderRef::Id(p.uploaded_by),
        };
        Self {
            id: p.id,
            title: p.title,
            subject: p.subject,
            year: p.year,
            exam_type: p.exam_type,
            college_name: p.college_name,
            course: p.course,
            uploaded_by,
            pdf_url: p.pdf_url,
            pdf_file_name: p.pdf_file_name,
            solution_text: p.solution_text,
            has_faculty_solution,
            questions: p.questions,
            ai_generated_solutions: p.ai_generated_solutions,
            views: p.views,
            downloads: p.downloads,
            upvotes,
            upvoted_by: p.upvoted_by,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaperListOut {
    pub success: bool,
    pub count: usize,
    pub papers: Vec<PaperOut>,
}

#[derive(Debug, Serialize)]
pub struct PaperEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub paper: PaperOut,
}

#[derive(Debug, Serialize)]
pub struct DownloadOut {
    pub success: bool,
    pub downloads: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteOut {
    pub success: bool,
    pub upvotes: u64,
    pub has_upvoted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOut {
    pub success: bool,
    pub is_saved: bool,
    pub saved_papers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
    pub success: bool,
    pub message: String,
}

// ---------- AI ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSolutionIn {
    pub question: Option<String>,
    pub paper_id: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSolutionOut {
    pub success: bool,
    pub question: String,
    pub answer: String,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub saved_to_paper: bool,
}

#[derive(Debug, Serialize)]
pub struct SolutionsOut {
    pub success: bool,
    pub solutions: Vec<AdHocSolution>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummarizeIn {
    pub topic: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeOut {
    pub success: bool,
    pub topic: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionSolutionOut {
    pub success: bool,
    pub question: Question,
}

// ---------- video search ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchIn {
    pub query: Option<String>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct VideoSearchOut {
    pub success: bool,
    pub count: usize,
    pub videos: Vec<Video>,
}

// ---------- accounts ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIn {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub college_name: Option<String>,
    pub course: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginIn {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A user profile as returned to its owner. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOut {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub college_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub is_verified: bool,
    pub saved_papers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserOut {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            college_name: u.college_name,
            course: u.course,
            year: u.year,
            is_verified: u.is_verified,
            saved_papers: u.saved_papers,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthOut {
    pub success: bool,
    pub token: String,
    pub user: UserOut,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: UserOut,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_paper, sample_user};

    #[test]
    fn paper_out_wire_shape() {
        let mut p = sample_paper("p1", "u1");
        p.solution_text = "Answers on page 2".into();
        p.upvoted_by = vec!["a".into(), "b".into()];
        let owner = sample_user("u1", "prof@mit.edu", Role::Faculty);
        let v = serde_json::to_value(PaperOut::new(p, Some(UploaderOut::with_college(&owner)))).unwrap();
        assert_eq!(v["_id"], "p1");
        assert_eq!(v["examType"], "college");
        assert_eq!(v["hasFacultySolution"], true);
        assert_eq!(v["upvotes"], 2);
        assert_eq!(v["uploadedBy"]["_id"], "u1");
        assert_eq!(v["uploadedBy"]["collegeName"], "MIT");
        assert!(v.get("pdfURL").is_some());
    }

    #[test]
    fn missing_uploader_falls_back_to_id() {
        let v = serde_json::to_value(PaperOut::new(sample_paper("p1", "gone"), None)).unwrap();
        assert_eq!(v["uploadedBy"], "gone");
    }

    #[test]
    fn user_out_hides_password_hash() {
        let v = serde_json::to_value(UserOut::from(sample_user("u1", "s@mit.edu", Role::Student))).unwrap();
        assert!(v.get("passwordHash").is_none() && v.get("password").is_none());
        assert_eq!(v["role"], "student");
        assert_eq!(v["course"], "BSc");
    }
}
