pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::domain::{AdHocSolution, AiSolution, PaperFilter, PaperUpdate, Question, QuestionPaper, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("failed to execute query: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("failed to encode/decode stored json: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an upvote toggle, read back in the same atomic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvoteState {
    pub upvotes: u64,
    pub has_upvoted: bool,
}

/// Outcome of a save toggle on a user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedState {
    pub is_saved: bool,
    pub saved_papers: Vec<String>,
}

/// Identity + paper persistence. Every read-modify-write is a single atomic
/// operation of the backend; callers never read, mutate and write back.
/// `Ok(None)` / `Ok(false)` means the addressed record does not exist.
pub trait Store: Send + Sync {
    // User methods
    async fn insert_user(&self, user: User) -> StoreResult<()>;
    async fn get_user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_users(&self, ids: &[String]) -> StoreResult<Vec<User>>;
    async fn toggle_saved_paper(&self, user_id: &str, paper_id: &str) -> StoreResult<Option<SavedState>>;

    // Paper methods
    async fn insert_paper(&self, paper: QuestionPaper) -> StoreResult<()>;
    /// Matching papers, newest first.
    async fn list_papers(&self, filter: &PaperFilter) -> StoreResult<Vec<QuestionPaper>>;
    async fn get_paper(&self, id: &str) -> StoreResult<Option<QuestionPaper>>;
    /// Increment views and return the updated record.
    async fn record_view(&self, id: &str) -> StoreResult<Option<QuestionPaper>>;
    async fn update_paper(&self, id: &str, update: &PaperUpdate) -> StoreResult<Option<QuestionPaper>>;
    async fn delete_paper(&self, id: &str) -> StoreResult<bool>;
    async fn increment_downloads(&self, id: &str) -> StoreResult<Option<u64>>;
    async fn toggle_upvote(&self, id: &str, user_id: &str) -> StoreResult<Option<UpvoteState>>;
    async fn append_solution(&self, id: &str, entry: AdHocSolution) -> StoreResult<bool>;
    /// Attach a solution to the first embedded question with `number`.
    /// `Ok(None)` when either the paper or the question is missing.
    async fn attach_question_solution(
        &self,
        id: &str,
        number: u32,
        solution: AiSolution,
    ) -> StoreResult<Option<Question>>;
}

pub enum StoreType {
    Memory(memory::MemoryStore),
    Sql(sqlite::SqlStore),
}

impl StoreType {
    /// Pick a backend from a connection string: `memory` (or empty) keeps
    /// everything in-process, `sqlite:` URLs go through sqlx.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let url = url.trim();
        if url.is_empty() || url == "memory" {
            return Ok(StoreType::Memory(memory::MemoryStore::new()));
        }
        Ok(StoreType::Sql(sqlite::SqlStore::new(url).await?))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            StoreType::Memory(_) => "memory",
            StoreType::Sql(_) => "sqlite",
        }
    }
}

impl Store for StoreType {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        match self {
            StoreType::Memory(db) => db.insert_user(user).await,
            StoreType::Sql(db) => db.insert_user(user).await,
        }
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        match self {
            StoreType::Memory(db) => db.get_user(id).await,
            StoreType::Sql(db) => db.get_user(id).await,
        }
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        match self {
            StoreType::Memory(db) => db.get_user_by_email(email).await,
            StoreType::Sql(db) => db.get_user_by_email(email).await,
        }
    }

    async fn get_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        match self {
            StoreType::Memory(db) => db.get_users(ids).await,
            StoreType::Sql(db) => db.get_users(ids).await,
        }
    }

    async fn toggle_saved_paper(&self, user_id: &str, paper_id: &str) -> StoreResult<Option<SavedState>> {
        match self {
            StoreType::Memory(db) => db.toggle_saved_paper(user_id, paper_id).await,
            StoreType::Sql(db) => db.toggle_saved_paper(user_id, paper_id).await,
        }
    }

    async fn insert_paper(&self, paper: QuestionPaper) -> StoreResult<()> {
        match self {
            StoreType::Memory(db) => db.insert_paper(paper).await,
            StoreType::Sql(db) => db.insert_paper(paper).await,
        }
    }

    async fn list_papers(&self, filter: &PaperFilter) -> StoreResult<Vec<QuestionPaper>> {
        match self {
            StoreType::Memory(db) => db.list_papers(filter).await,
            StoreType::Sql(db) => db.list_papers(filter).await,
        }
    }

    async fn get_paper(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        match self {
            StoreType::Memory(db) => db.get_paper(id).await,
            StoreType::Sql(db) => db.get_paper(id).await,
        }
    }

    async fn record_view(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        match self {
            StoreType::Memory(db) => db.record_view(id).await,
            StoreType::Sql(db) => db.record_view(id).await,
        }
    }

    async fn update_paper(&self, id: &str, update: &PaperUpdate) -> StoreResult<Option<QuestionPaper>> {
        match self {
            StoreType::Memory(db) => db.update_paper(id, update).await,
            StoreType::Sql(db) => db.update_paper(id, update).await,
        }
    }

    async fn delete_paper(&self, id: &str) -> StoreResult<bool> {
        match self {
            StoreType::Memory(db) => db.delete_paper(id).await,
            StoreType::Sql(db) => db.delete_paper(id).await,
        }
    }

    async fn increment_downloads(&self, id: &str) -> StoreResult<Option<u64>> {
        match self {
            StoreType::Memory(db) => db.increment_downloads(id).await,
            StoreType::Sql(db) => db.increment_downloads(id).await,
        }
    }

    async fn toggle_upvote(&self, id: &str, user_id: &str) -> StoreResult<Option<UpvoteState>> {
        match self {
            StoreType::Memory(db) => db.toggle_upvote(id, user_id).await,
            StoreType::Sql(db) => db.toggle_upvote(id, user_id).await,
        }
    }

    async fn append_solution(&self, id: &str, entry: AdHocSolution) -> StoreResult<bool> {
        match self {
            StoreType::Memory(db) => db.append_solution(id, entry).await,
            StoreType::Sql(db) => db.append_solution(id, entry).await,
        }
    }

    async fn attach_question_solution(
        &self,
        id: &str,
        number: u32,
        solution: AiSolution,
    ) -> StoreResult<Option<Question>> {
        match self {
            StoreType::Memory(db) => db.attach_question_solution(id, number, solution).await,
            StoreType::Sql(db) => db.attach_question_solution(id, number, solution).await,
        }
    }
}
