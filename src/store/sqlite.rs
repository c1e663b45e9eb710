//! SQLite store (sqlx). Upvotes, saved papers and ad-hoc solutions live in
//! their own tables so membership and counts are derived in SQL; counters use
//! single `update ... returning` statements; toggles run inside a transaction
//! whose first statement is a write, so the database write lock is taken
//! before anything is read and concurrent writers serialize on it. A dropped
//! `Transaction` rolls back, so a cancelled request never leaves one open.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool,
};

use super::{SavedState, Store, StoreError, StoreResult, UpvoteState};
use crate::domain::{
    AdHocSolution, AiSolution, ExamType, PaperFilter, PaperUpdate, Question, QuestionPaper, Role, User,
};

const SCHEMA: &str = r#"
create table if not exists users (
    id text primary key,
    name text not null,
    email text not null unique collate nocase,
    password_hash text not null,
    role text not null,
    college_name text not null,
    course text,
    year text,
    is_verified integer not null default 1,
    created_at text not null
);

create table if not exists saved_papers (
    user_id text not null,
    paper_id text not null,
    primary key (user_id, paper_id)
);

create table if not exists papers (
    seq integer primary key autoincrement,
    id text not null unique,
    title text not null,
    subject text not null,
    year text not null,
    exam_type text not null default 'college',
    college_name text not null,
    course text not null,
    uploaded_by text not null,
    pdf_url text not null,
    pdf_file_name text not null,
    solution_text text not null default '',
    questions text not null default '[]',
    views integer not null default 0,
    downloads integer not null default 0,
    created_at text not null
);

create index if not exists papers_college_course_year on papers (college_name, course, year);
create index if not exists papers_subject on papers (subject);
create index if not exists papers_exam_type on papers (exam_type);

create table if not exists paper_upvotes (
    paper_id text not null,
    user_id text not null,
    primary key (paper_id, user_id)
);

create table if not exists ai_solutions (
    seq integer primary key autoincrement,
    paper_id text not null,
    question text not null,
    answer text not null,
    generated_at text not null
);

create index if not exists ai_solutions_paper on ai_solutions (paper_id);
"#;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, college_name, course, year, is_verified, created_at";

pub struct SqlStore {
    pool: SqlitePool,
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}

fn user_from_row(row: &SqliteRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::parse(&role).ok_or_else(|| StoreError::Corrupt(format!("bad role '{}'", role)))?,
        college_name: row.try_get("college_name")?,
        course: row.try_get("course")?,
        year: row.try_get("year")?,
        is_verified: row.try_get("is_verified")?,
        saved_papers: Vec::new(),
        created_at: parse_ts(&created_at)?,
    })
}

fn paper_from_row(row: &SqliteRow) -> StoreResult<QuestionPaper> {
    let exam_type: String = row.try_get("exam_type")?;
    let questions: String = row.try_get("questions")?;
    let created_at: String = row.try_get("created_at")?;
    let views: i64 = row.try_get("views")?;
    let downloads: i64 = row.try_get("downloads")?;
    Ok(QuestionPaper {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        subject: row.try_get("subject")?,
        year: row.try_get("year")?,
        exam_type: ExamType::parse(&exam_type)
            .ok_or_else(|| StoreError::Corrupt(format!("bad exam type '{}'", exam_type)))?,
        college_name: row.try_get("college_name")?,
        course: row.try_get("course")?,
        uploaded_by: row.try_get("uploaded_by")?,
        pdf_url: row.try_get("pdf_url")?,
        pdf_file_name: row.try_get("pdf_file_name")?,
        solution_text: row.try_get("solution_text")?,
        questions: serde_json::from_str(&questions)?,
        ai_generated_solutions: Vec::new(),
        views: views as u64,
        downloads: downloads as u64,
        upvoted_by: Vec::new(),
        created_at: parse_ts(&created_at)?,
    })
}

async fn saved_papers_of(conn: &mut SqliteConnection, user_id: &str) -> StoreResult<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("select paper_id from saved_papers where user_id = ? order by rowid;")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn load_user(conn: &mut SqliteConnection, row: &SqliteRow) -> StoreResult<User> {
    let mut user = user_from_row(row)?;
    user.saved_papers = saved_papers_of(conn, &user.id).await?;
    Ok(user)
}

/// Fill the side tables (upvoters, solution log) into a decoded paper row.
async fn hydrate(conn: &mut SqliteConnection, row: &SqliteRow) -> StoreResult<QuestionPaper> {
    let mut paper = paper_from_row(row)?;

    let voters: Vec<(String,)> =
        sqlx::query_as("select user_id from paper_upvotes where paper_id = ? order by rowid;")
            .bind(&paper.id)
            .fetch_all(&mut *conn)
            .await?;
    paper.upvoted_by = voters.into_iter().map(|(u,)| u).collect();

    let solutions: Vec<(String, String, String)> = sqlx::query_as(
        "select question, answer, generated_at from ai_solutions where paper_id = ? order by seq;",
    )
    .bind(&paper.id)
    .fetch_all(&mut *conn)
    .await?;
    paper.ai_generated_solutions = solutions
        .into_iter()
        .map(|(question, answer, at)| {
            Ok(AdHocSolution { question, answer, generated_at: parse_ts(&at)? })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(paper)
}

async fn load_paper(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<QuestionPaper>> {
    let row = sqlx::query("select * from papers where id = ?;")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(hydrate(conn, &row).await?)),
        None => Ok(None),
    }
}

async fn paper_exists(conn: &mut SqliteConnection, id: &str) -> StoreResult<bool> {
    let found: Option<(i64,)> = sqlx::query_as("select 1 from papers where id = ?;")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

impl SqlStore {
    pub async fn new(url: &str) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // an in-memory database lives and dies with its single connection
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let (opts, pool_opts) = if in_memory {
            let pool_opts = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            (opts, pool_opts)
        } else {
            (opts.journal_mode(SqliteJournalMode::Wal), SqlitePoolOptions::new().max_connections(8))
        };
        let pool = pool_opts.connect_with(opts).await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

impl Store for SqlStore {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let result = sqlx::query(
            "insert into users (id, name, email, password_hash, role, college_name, course, year, is_verified, created_at)
             values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.college_name)
        .bind(&user.course)
        .bind(&user.year)
        .bind(user.is_verified)
        .bind(ts(&user.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Duplicate(user.email)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!("select {} from users where id = ?;", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_user(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!("select {} from users where email = ? collate nocase;", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(load_user(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn get_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;
        let mut qb = QueryBuilder::<Sqlite>::new(format!("select {} from users where id in (", USER_COLUMNS));
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id.clone());
        }
        sep.push_unseparated(")");
        let rows = qb.build().fetch_all(&mut *conn).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(load_user(&mut conn, row).await?);
        }
        Ok(users)
    }

    async fn toggle_saved_paper(&self, user_id: &str, paper_id: &str) -> StoreResult<Option<SavedState>> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("delete from saved_papers where user_id = ? and paper_id = ?;")
            .bind(user_id)
            .bind(paper_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            let found: Option<(i64,)> = sqlx::query_as("select 1 from users where id = ?;")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
            if found.is_none() {
                return Ok(None);
            }
            sqlx::query("insert into saved_papers (user_id, paper_id) values (?, ?);")
                .bind(user_id)
                .bind(paper_id)
                .execute(&mut *tx)
                .await?;
        }

        let saved_papers = saved_papers_of(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(Some(SavedState { is_saved: removed == 0, saved_papers }))
    }

    async fn insert_paper(&self, paper: QuestionPaper) -> StoreResult<()> {
        let questions = serde_json::to_string(&paper.questions)?;
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "insert into papers (id, title, subject, year, exam_type, college_name, course, uploaded_by,
                                 pdf_url, pdf_file_name, solution_text, questions, views, downloads, created_at)
             values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);",
        )
        .bind(&paper.id)
        .bind(&paper.title)
        .bind(&paper.subject)
        .bind(&paper.year)
        .bind(paper.exam_type.as_str())
        .bind(&paper.college_name)
        .bind(&paper.course)
        .bind(&paper.uploaded_by)
        .bind(&paper.pdf_url)
        .bind(&paper.pdf_file_name)
        .bind(&paper.solution_text)
        .bind(questions)
        .bind(paper.views as i64)
        .bind(paper.downloads as i64)
        .bind(ts(&paper.created_at))
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Err(StoreError::Duplicate(paper.id)),
            Err(e) => return Err(e.into()),
        }

        for user_id in &paper.upvoted_by {
            sqlx::query("insert or ignore into paper_upvotes (paper_id, user_id) values (?, ?);")
                .bind(&paper.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        for s in &paper.ai_generated_solutions {
            sqlx::query("insert into ai_solutions (paper_id, question, answer, generated_at) values (?, ?, ?, ?);")
                .bind(&paper.id)
                .bind(&s.question)
                .bind(&s.answer)
                .bind(ts(&s.generated_at))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_papers(&self, filter: &PaperFilter) -> StoreResult<Vec<QuestionPaper>> {
        let mut qb = QueryBuilder::<Sqlite>::new("select * from papers where 1 = 1");
        if let Some(c) = &filter.college_name {
            qb.push(" and college_name = ").push_bind(c.clone());
        }
        if let Some(c) = &filter.course {
            qb.push(" and course = ").push_bind(c.clone());
        }
        if let Some(y) = &filter.year {
            qb.push(" and year = ").push_bind(y.clone());
        }
        if let Some(e) = &filter.exam_type {
            qb.push(" and exam_type = ").push_bind(e.clone());
        }
        // instr() rather than like so '%' and '_' in user input stay literal
        if let Some(s) = &filter.subject {
            qb.push(" and instr(lower(subject), lower(").push_bind(s.clone()).push(")) > 0");
        }
        if let Some(q) = &filter.search {
            qb.push(" and (instr(lower(title), lower(")
                .push_bind(q.clone())
                .push(")) > 0 or instr(lower(subject), lower(")
                .push_bind(q.clone())
                .push(")) > 0)");
        }
        qb.push(" order by created_at desc, seq desc;");

        let mut conn = self.pool.acquire().await?;
        let rows = qb.build().fetch_all(&mut *conn).await?;
        let mut papers = Vec::with_capacity(rows.len());
        for row in &rows {
            papers.push(hydrate(&mut conn, row).await?);
        }
        Ok(papers)
    }

    async fn get_paper(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        let mut conn = self.pool.acquire().await?;
        load_paper(&mut conn, id).await
    }

    async fn record_view(&self, id: &str) -> StoreResult<Option<QuestionPaper>> {
        let mut conn = self.pool.acquire().await?;
        let updated = sqlx::query("update papers set views = views + 1 where id = ?;")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        load_paper(&mut conn, id).await
    }

    async fn update_paper(&self, id: &str, update: &PaperUpdate) -> StoreResult<Option<QuestionPaper>> {
        let mut conn = self.pool.acquire().await?;
        let updated = sqlx::query(
            "update papers set
                title = coalesce(?, title),
                subject = coalesce(?, subject),
                year = coalesce(?, year),
                solution_text = coalesce(?, solution_text)
             where id = ?;",
        )
        .bind(&update.title)
        .bind(&update.subject)
        .bind(&update.year)
        .bind(&update.solution_text)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        load_paper(&mut conn, id).await
    }

    async fn delete_paper(&self, id: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("delete from papers where id = ?;")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("delete from paper_upvotes where paper_id = ?;")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("delete from ai_solutions where paper_id = ?;")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn increment_downloads(&self, id: &str) -> StoreResult<Option<u64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("update papers set downloads = downloads + 1 where id = ? returning downloads;")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(n,)| n as u64))
    }

    async fn toggle_upvote(&self, id: &str, user_id: &str) -> StoreResult<Option<UpvoteState>> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("delete from paper_upvotes where paper_id = ? and user_id = ?;")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            if !paper_exists(&mut tx, id).await? {
                return Ok(None);
            }
            sqlx::query("insert into paper_upvotes (paper_id, user_id) values (?, ?);")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let (count,): (i64,) = sqlx::query_as("select count(*) from paper_upvotes where paper_id = ?;")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(UpvoteState { upvotes: count as u64, has_upvoted: removed == 0 }))
    }

    async fn append_solution(&self, id: &str, entry: AdHocSolution) -> StoreResult<bool> {
        let inserted = sqlx::query(
            "insert into ai_solutions (paper_id, question, answer, generated_at)
             select ?, ?, ?, ? where exists (select 1 from papers where id = ?);",
        )
        .bind(id)
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(ts(&entry.generated_at))
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    async fn attach_question_solution(
        &self,
        id: &str,
        number: u32,
        solution: AiSolution,
    ) -> StoreResult<Option<Question>> {
        let mut tx = self.pool.begin().await?;
        // no-op write: takes the write lock and tells whether the paper exists
        let touched = sqlx::query("update papers set questions = questions where id = ?;")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Ok(None);
        }

        let (raw,): (String,) = sqlx::query_as("select questions from papers where id = ?;")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let mut questions: Vec<Question> = serde_json::from_str(&raw)?;
        let Some(q) = questions.iter_mut().find(|q| q.question_number == Some(number)) else {
            return Ok(None);
        };
        q.ai_solution = Some(solution);
        let attached = q.clone();

        sqlx::query("update papers set questions = ? where id = ?;")
            .bind(serde_json::to_string(&questions)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(attached))
    }
}
