//! In-process store. Each operation takes the relevant write guard once and
//! finishes its read-modify-write before releasing it.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::{SavedState, Store, StoreError, StoreResult, UpvoteState};
use crate::domain::{AdHocSolution, AiSolution, PaperFilter, PaperUpdate, Question, QuestionPaper, User};

#[derive(Default)]
struct Papers {
    by_id: HashMap<String, QuestionPaper>,
    /// Insertion order, oldest first.
    order: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    papers: Arc<RwLock<Papers>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Duplicate(user.email));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn get_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn toggle_saved_paper(&self, user_id: &str, paper_id: &str) -> StoreResult<Option<SavedState>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(user_id) else { return Ok(None) };
        let is_saved = match user.saved_papers.iter().position(|p| p == paper_id) {
            Some(idx) => {
                user.saved_papers.remove(idx);
                false
            }
            None => {
                user.saved_papers.push(paper_id.to_string());
                true
            }
        };
        Ok(Some(SavedState { is_saved, saved_papers: user.saved_papers.clone() }))
    }

    async fn insert_paper(&self, paper: QuestionPaper) -> StoreResult<()> {
        let mut papers = self.papers.write().await;
        if papers.by_id.contains_key(&paper.id) {
            return Err(StoreError::Duplicate(paper.id));
        }
        papers.order.push(paper.id.clone());
        papers.by_id.insert(paper.id.clone(), paper);
        Ok(())
    }

    async fn list_papers(&self, filter: &PaperFilter) -> StoreResult<Vec<QuestionPaper>> {
        let papers = self.papers.read().await;
        let mut out: Vec<QuestionPaper> = papers
            .order
            .iter()
            .rev()
            .filter_map(|id| papers.by_id.get(id))
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get_paper(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        Ok(self.papers.read().await.by_id.get(id).cloned())
    }

    async fn record_view(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        let mut papers = self.papers.write().await;
        Ok(papers.by_id.get_mut(id).map(|p| {
            p.views += 1;
            p.clone()
        }))
    }

    async fn update_paper(&self, id: &str, update: &PaperUpdate) -> StoreResult<Option<QuestionPaper>> {
        let mut papers = self.papers.write().await;
        Ok(papers.by_id.get_mut(id).map(|p| {
            p.apply(update);
            p.clone()
        }))
    }

    async fn delete_paper(&self, id: &str) -> StoreResult<bool> {
        let mut papers = self.papers.write().await;
        if papers.by_id.remove(id).is_none() {
            return Ok(false);
        }
        papers.order.retain(|p| p != id);
        Ok(true)
    }

    async fn increment_downloads(&self, id: &str) -> StoreResult<Option<u64>> {
        let mut papers = self.papers.write().await;
        Ok(papers.by_id.get_mut(id).map(|p| {
            p.downloads += 1;
            p.downloads
        }))
    }

    async fn toggle_upvote(&self, id: &str, user_id: &str) -> StoreResult<Option<UpvoteState>> {
        let mut papers = self.papers.write().await;
        let Some(p) = papers.by_id.get_mut(id) else { return Ok(None) };
        let has_upvoted = match p.upvoted_by.iter().position(|u| u == user_id) {
            Some(idx) => {
                p.upvoted_by.remove(idx);
                false
            }
            None => {
                p.upvoted_by.push(user_id.to_string());
                true
            }
        };
        Ok(Some(UpvoteState { upvotes: p.upvotes(), has_upvoted }))
    }

    async fn append_solution(&self, id: &str, entry: AdHocSolution) -> StoreResult<bool> {
        let mut papers = self.papers.write().await;
        match papers.by_id.get_mut(id) {
            Some(p) => {
                p.ai_generated_solutions.push(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn attach_question_solution(
        &self,
        id: &str,
        number: u32,
        solution: AiSolution,
    ) -> StoreResult<Option<Question>> {
        let mut papers = self.papers.write().await;
        let Some(p) = papers.by_id.get_mut(id) else { return Ok(None) };
        Ok(p
            .questions
            .iter_mut()
            .find(|q| q.question_number == Some(number))
            .map(|q| {
                q.ai_solution = Some(solution);
                q.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_paper, sample_user};
    use crate::domain::Role;

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let db = MemoryStore::new();
        db.insert_user(sample_user("u1", "a@x.edu", Role::Student)).await.unwrap();
        let err = db.insert_user(sample_user("u2", "A@X.edu", Role::Faculty)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(db.get_user_by_email("A@x.EDU").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upvote_toggle_keeps_count_in_sync() {
        let db = MemoryStore::new();
        db.insert_paper(sample_paper("p1", "owner")).await.unwrap();

        let s = db.toggle_upvote("p1", "a").await.unwrap().unwrap();
        assert_eq!(s, UpvoteState { upvotes: 1, has_upvoted: true });
        let s = db.toggle_upvote("p1", "b").await.unwrap().unwrap();
        assert_eq!(s.upvotes, 2);
        let s = db.toggle_upvote("p1", "a").await.unwrap().unwrap();
        assert_eq!(s, UpvoteState { upvotes: 1, has_upvoted: false });

        let p = db.get_paper("p1").await.unwrap().unwrap();
        assert_eq!(p.upvoted_by, vec!["b".to_string()]);
        assert!(db.toggle_upvote("missing", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upvotes_do_not_drift() {
        let db = MemoryStore::new();
        db.insert_paper(sample_paper("p1", "owner")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.toggle_upvote("p1", &format!("user-{}", i)).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let p = db.get_paper("p1").await.unwrap().unwrap();
        assert_eq!(p.upvotes(), 32);
        assert_eq!(p.upvoted_by.len(), 32);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = MemoryStore::new();
        let mut old = sample_paper("old", "owner");
        old.created_at = chrono::Utc::now() - chrono::Duration::days(1);
        db.insert_paper(sample_paper("new", "owner")).await.unwrap();
        db.insert_paper(old).await.unwrap();

        let ids: Vec<String> = db
            .list_papers(&PaperFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_save_toggle_is_per_user() {
        let db = MemoryStore::new();
        db.insert_user(sample_user("u1", "a@x.edu", Role::Student)).await.unwrap();
        db.insert_user(sample_user("u2", "b@x.edu", Role::Student)).await.unwrap();

        let s = db.toggle_saved_paper("u1", "p1").await.unwrap().unwrap();
        assert!(s.is_saved);
        assert_eq!(s.saved_papers, vec!["p1".to_string()]);
        assert!(db.get_user("u2").await.unwrap().unwrap().saved_papers.is_empty());

        let s = db.toggle_saved_paper("u1", "p1").await.unwrap().unwrap();
        assert!(!s.is_saved);
        assert!(s.saved_papers.is_empty());
    }

    #[tokio::test]
    async fn test_attach_question_solution() {
        let db = MemoryStore::new();
        let mut p = sample_paper("p1", "owner");
        p.questions = vec![
            Question::new(Some(1), "Define entropy".into(), Some(5)),
            Question::new(Some(2), "State Hess's law".into(), None),
        ];
        db.insert_paper(p).await.unwrap();

        let sol = AiSolution::generated("disorder".into(), chrono::Utc::now());
        let q = db.attach_question_solution("p1", 1, sol).await.unwrap().unwrap();
        assert!(q.ai_solution.unwrap().is_generated());
        assert!(db
            .attach_question_solution("p1", 9, AiSolution::generated("x".into(), chrono::Utc::now()))
            .await
            .unwrap()
            .is_none());

        let stored = db.get_paper("p1").await.unwrap().unwrap();
        assert!(stored.questions[1].ai_solution.is_none());
    }
}
