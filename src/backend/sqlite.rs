//! Embedded SQLite backend
//!
//! Stores the whole data model in one SQLite file and runs every query on
//! tokio's blocking pool through an r2d2 connection pool.
//!
//! # Schema
//!
//! ```text
//! profiles ─┐
//!           ├── questions ──┬── question_tags ── tags
//!           │               └── comments
//!           └───────────────────────┘
//! ```
//!
//! Schema versions are tracked in the `metadata` table. Foreign keys are
//! declarative only (`PRAGMA foreign_keys` stays off) so a question can be
//! posted before its author's profile row has been provisioned.

use super::{
    Backend, BackendError, BackendResult, ProfileQuery, QuestionQuery, QuestionSort, TagQuery,
};
use crate::model::{
    Comment, CommentWithAuthor, NewComment, NewProfile, NewQuestion, Profile, ProfileUpdate,
    Question, QuestionId, QuestionWithAuthor, TagSummary, UserId,
};
use crate::slug::slugify;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::{BoxFuture, FutureExt};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, ErrorCode, Row};
use std::path::Path;

const SCHEMA_VERSION: i32 = 2;

const QUESTION_SELECT: &str = "SELECT q.id, q.title, q.body, q.category, q.tags, q.slug, \
     q.author_id, q.votes, q.views, q.answer_count, q.created_at, q.updated_at, \
     p.id, p.username, p.display_name, p.avatar_url, p.bio, p.reputation, p.created_at \
     FROM questions q LEFT JOIN profiles p ON p.id = q.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.question_id, c.author_id, c.body, c.votes, \
     c.accepted, c.created_at, \
     p.id, p.username, p.display_name, p.avatar_url, p.bio, p.reputation, p.created_at \
     FROM comments c LEFT JOIN profiles p ON p.id = c.author_id";

const PROFILE_SELECT: &str =
    "SELECT id, username, display_name, avatar_url, bio, reputation, created_at FROM profiles";

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => BackendError::NotFound,
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) =>
            {
                BackendError::Conflict(msg.unwrap_or_else(|| e.to_string()))
            }
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for BackendError {
    fn from(err: r2d2::Error) -> Self {
        BackendError::Unavailable(format!("connection pool: {}", err))
    }
}

/// SQLite-backed implementation of [`Backend`]
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteBackend {
    /// Open (or create) the database file and apply migrations
    pub fn open(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout=5000;"));
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .context("Failed to build SQLite pool")?;

        Self::from_pool(pool)
    }

    /// Private in-memory database (single pooled connection)
    pub fn in_memory() -> anyhow::Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .context("Failed to build in-memory SQLite pool")?;

        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> anyhow::Result<Self> {
        let conn = pool.get()?;
        init_schema(&conn).context("Failed to initialize schema")?;
        drop(conn);
        Ok(Self { pool })
    }

    /// Run a closure against a pooled connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&mut Connection) -> BackendResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| BackendError::Unavailable(format!("worker task failed: {}", e)))?
    }
}

/// Initialize database schema with WAL mode and run migrations
fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        "#,
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(
                (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
                0
            )",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v1_to_v2(conn)?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

fn apply_schema_v1(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            avatar_url TEXT,
            bio TEXT,
            reputation INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            category TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',  -- JSON array of tag names
            slug TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES profiles(id),
            votes INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            answer_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_questions_created ON questions(created_at);
        CREATE INDEX IF NOT EXISTS idx_questions_votes ON questions(votes);
        CREATE INDEX IF NOT EXISTS idx_questions_author ON questions(author_id);

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id TEXT NOT NULL REFERENCES questions(id),
            author_id TEXT NOT NULL REFERENCES profiles(id),
            body TEXT NOT NULL,
            votes INTEGER NOT NULL DEFAULT 0,
            accepted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_question ON comments(question_id);
        "#,
    )?;
    Ok(())
}

/// v2: tags become first-class rows with a question association table
fn migrate_v1_to_v2(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS question_tags (
            question_id TEXT NOT NULL REFERENCES questions(id),
            tag_slug TEXT NOT NULL REFERENCES tags(slug),
            PRIMARY KEY (question_id, tag_slug)
        );
        CREATE INDEX IF NOT EXISTS idx_question_tags_tag ON question_tags(tag_slug);
        "#,
    )?;

    // Backfill associations for questions written before v2
    let mut stmt = conn.prepare("SELECT id, tags FROM questions")?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    for (id, tags) in rows {
        let tags: Vec<String> = serde_json::from_str(&tags).unwrap_or_default();
        link_tags(conn, &id, &tags)?;
    }
    Ok(())
}

fn link_tags(conn: &Connection, question_id: &str, tags: &[String]) -> rusqlite::Result<()> {
    for tag in tags {
        let slug = slugify(tag);
        if slug.is_empty() {
            continue;
        }
        conn.execute(
            "INSERT OR IGNORE INTO tags (slug, name) VALUES (?1, ?2)",
            params![slug, tag],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO question_tags (question_id, tag_slug) VALUES (?1, ?2)",
            params![question_id, slug],
        )?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn question_at(row: &Row<'_>) -> rusqlite::Result<Question> {
    let tags_json: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Question {
        id: QuestionId(row.get(0)?),
        title: row.get(1)?,
        body: row.get(2)?,
        category: row.get(3)?,
        tags,
        slug: row.get(5)?,
        author_id: UserId(row.get(6)?),
        votes: row.get(7)?,
        views: row.get(8)?,
        answer_count: row.get(9)?,
        created_at: ts_at(row, 10)?,
        updated_at: ts_at(row, 11)?,
    })
}

/// Profile columns starting at `base`; `None` when the LEFT JOIN missed
fn joined_profile_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<Profile>> {
    let id: Option<String> = row.get(base)?;
    match id {
        Some(_) => profile_at(row, base).map(Some),
        None => Ok(None),
    }
}

fn profile_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: UserId(row.get(base)?),
        username: row.get(base + 1)?,
        display_name: row.get(base + 2)?,
        avatar_url: row.get(base + 3)?,
        bio: row.get(base + 4)?,
        reputation: row.get(base + 5)?,
        created_at: ts_at(row, base + 6)?,
    })
}

fn question_with_author(row: &Row<'_>) -> rusqlite::Result<QuestionWithAuthor> {
    Ok(QuestionWithAuthor {
        question: question_at(row)?,
        author: joined_profile_at(row, 12)?,
    })
}

fn comment_with_author(row: &Row<'_>) -> rusqlite::Result<CommentWithAuthor> {
    Ok(CommentWithAuthor {
        comment: Comment {
            id: row.get(0)?,
            question_id: QuestionId(row.get(1)?),
            author_id: UserId(row.get(2)?),
            body: row.get(3)?,
            votes: row.get(4)?,
            accepted: row.get(5)?,
            created_at: ts_at(row, 6)?,
        },
        author: joined_profile_at(row, 7)?,
    })
}

/// Escape LIKE wildcards and wrap the term for substring matching
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// SQLite treats a negative LIMIT as "no limit"
fn sql_limit(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }
}

fn sql_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Build the listing SQL and its positional parameters
fn question_list_sql(query: &QuestionQuery) -> (String, Vec<Box<dyn ToSql + Send>>) {
    let mut clauses = Vec::new();
    let mut args: Vec<Box<dyn ToSql + Send>> = Vec::new();

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        args.push(Box::new(like_pattern(term)));
        clauses.push(format!("q.title LIKE ?{} ESCAPE '\\'", args.len()));
    }
    if let Some(tag) = query.tag.as_deref().filter(|t| !t.is_empty()) {
        args.push(Box::new(tag.to_string()));
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM question_tags qt WHERE qt.question_id = q.id AND qt.tag_slug = ?{})",
            args.len()
        ));
    }
    if let Some(author) = &query.author {
        args.push(Box::new(author.0.clone()));
        clauses.push(format!("q.author_id = ?{}", args.len()));
    }
    if query.sort == QuestionSort::Unanswered {
        clauses.push("q.answer_count = 0".to_string());
    }

    let order = match query.sort {
        QuestionSort::Newest | QuestionSort::Unanswered => "q.created_at DESC, q.rowid DESC",
        QuestionSort::Votes => "q.votes DESC, q.created_at DESC",
        QuestionSort::Views => "q.views DESC, q.created_at DESC",
    };

    let mut sql = QUESTION_SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    args.push(Box::new(sql_limit(query.limit)));
    args.push(Box::new(sql_offset(query.offset)));
    sql.push_str(&format!(
        " ORDER BY {} LIMIT ?{} OFFSET ?{}",
        order,
        args.len() - 1,
        args.len()
    ));

    (sql, args)
}

fn fetch_question(conn: &Connection, id: &str) -> rusqlite::Result<QuestionWithAuthor> {
    conn.query_row(
        &format!("{} WHERE q.id = ?1", QUESTION_SELECT),
        params![id],
        question_with_author,
    )
}

fn fetch_profile(conn: &Connection, id: &str) -> rusqlite::Result<Profile> {
    conn.query_row(
        &format!("{} WHERE id = ?1", PROFILE_SELECT),
        params![id],
        |row| profile_at(row, 0),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn insert_question<'a>(&'a self, question: &'a NewQuestion) -> BoxFuture<'a, BackendResult<Question>> {
        let question = question.clone();
        self.with_conn(move |conn| {
            let now = format_ts(Utc::now());
            let tags_json = serde_json::to_string(&question.tags)
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO questions
                    (id, title, body, category, tags, slug, author_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    question.id.0,
                    question.title,
                    question.body,
                    question.category,
                    tags_json,
                    question.slug,
                    question.author_id.0,
                    now,
                ],
            )?;
            link_tags(&tx, &question.id.0, &question.tags)?;
            let stored = fetch_question(&tx, &question.id.0)?;
            tx.commit()?;

            Ok(stored.question)
        })
        .boxed()
    }

    fn get_question<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<QuestionWithAuthor>> {
        let id = id.0.clone();
        self.with_conn(move |conn| Ok(fetch_question(conn, &id)?))
            .boxed()
    }

    fn list_questions<'a>(
        &'a self,
        query: &'a QuestionQuery,
    ) -> BoxFuture<'a, BackendResult<Vec<QuestionWithAuthor>>> {
        let (sql, args) = question_list_sql(query);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref() as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), question_with_author)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .boxed()
    }

    fn increment_views<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<()>> {
        let id = id.0.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE questions SET views = views + 1 WHERE id = ?1",
                params![id],
            )?;
            if changed == 0 {
                return Err(BackendError::NotFound);
            }
            Ok(())
        })
        .boxed()
    }

    fn list_comments<'a>(
        &'a self,
        question_id: &'a QuestionId,
    ) -> BoxFuture<'a, BackendResult<Vec<CommentWithAuthor>>> {
        let id = question_id.0.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.question_id = ?1 ORDER BY c.created_at DESC, c.id DESC",
                COMMENT_SELECT
            ))?;
            let rows = stmt
                .query_map(params![id], comment_with_author)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .boxed()
    }

    fn insert_comment<'a>(&'a self, comment: &'a NewComment) -> BoxFuture<'a, BackendResult<()>> {
        let comment = comment.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE questions SET answer_count = answer_count + 1 WHERE id = ?1",
                params![comment.question_id.0],
            )?;
            if changed == 0 {
                return Err(BackendError::NotFound);
            }
            tx.execute(
                "INSERT INTO comments (question_id, author_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    comment.question_id.0,
                    comment.author_id.0,
                    comment.body,
                    format_ts(Utc::now()),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .boxed()
    }

    fn get_profile<'a>(&'a self, id: &'a UserId) -> BoxFuture<'a, BackendResult<Profile>> {
        let id = id.0.clone();
        self.with_conn(move |conn| Ok(fetch_profile(conn, &id)?))
            .boxed()
    }

    fn get_profile_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, BackendResult<Profile>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                &format!("{} WHERE username = ?1", PROFILE_SELECT),
                params![username],
                |row| profile_at(row, 0),
            )?)
        })
        .boxed()
    }

    fn insert_profile<'a>(&'a self, profile: &'a NewProfile) -> BoxFuture<'a, BackendResult<Profile>> {
        let profile = profile.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, display_name, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    profile.id.0,
                    profile.username,
                    profile.display_name,
                    profile.avatar_url,
                    format_ts(Utc::now()),
                ],
            )?;
            Ok(fetch_profile(conn, &profile.id.0)?)
        })
        .boxed()
    }

    fn update_profile<'a>(
        &'a self,
        id: &'a UserId,
        update: &'a ProfileUpdate,
    ) -> BoxFuture<'a, BackendResult<Profile>> {
        let id = id.0.clone();
        let update = update.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE profiles SET username = ?2, display_name = ?3, avatar_url = ?4, bio = ?5
                 WHERE id = ?1",
                params![id, update.username, update.display_name, update.avatar_url, update.bio],
            )?;
            if changed == 0 {
                return Err(BackendError::NotFound);
            }
            Ok(fetch_profile(conn, &id)?)
        })
        .boxed()
    }

    fn list_profiles<'a>(&'a self, query: &'a ProfileQuery) -> BoxFuture<'a, BackendResult<Vec<Profile>>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let limit = sql_limit(query.limit);
        let offset = sql_offset(query.offset);
        self.with_conn(move |conn| {
            let order = "ORDER BY reputation DESC, created_at ASC LIMIT ?1 OFFSET ?2";
            let rows = match search {
                Some(pattern) => {
                    let mut stmt = conn.prepare(&format!(
                        "{} WHERE username LIKE ?3 ESCAPE '\\' OR display_name LIKE ?3 ESCAPE '\\' {}",
                        PROFILE_SELECT, order
                    ))?;
                    let rows = stmt
                        .query_map(params![limit, offset, pattern], |row| profile_at(row, 0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!("{} {}", PROFILE_SELECT, order))?;
                    let rows = stmt
                        .query_map(params![limit, offset], |row| profile_at(row, 0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
        .boxed()
    }

    fn list_tags<'a>(&'a self, query: &'a TagQuery) -> BoxFuture<'a, BackendResult<Vec<TagSummary>>> {
        let pattern = like_pattern(query.search.as_deref().map(str::trim).unwrap_or(""));
        let limit = sql_limit(query.limit);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.name, t.slug, COUNT(qt.question_id) AS question_count
                 FROM tags t
                 LEFT JOIN question_tags qt ON qt.tag_slug = t.slug
                 WHERE t.name LIKE ?1 ESCAPE '\\' OR t.slug LIKE ?1 ESCAPE '\\'
                 GROUP BY t.slug
                 ORDER BY question_count DESC, t.name ASC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, limit], |row| {
                    Ok(TagSummary {
                        name: row.get(0)?,
                        slug: row.get(1)?,
                        question_count: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        SqliteBackend::in_memory().unwrap()
    }

    fn new_question(id: &str, title: &str, tags: &[&str], author: &str) -> NewQuestion {
        NewQuestion {
            id: QuestionId(id.to_string()),
            title: title.to_string(),
            body: "A body that is long enough to pass.".to_string(),
            category: "বলবিদ্যা".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            slug: slugify(title),
            author_id: UserId(author.to_string()),
        }
    }

    fn new_profile(id: &str, username: &str) -> NewProfile {
        NewProfile {
            id: UserId(id.to_string()),
            username: username.to_string(),
            display_name: username.to_uppercase(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_question_with_author() {
        let db = backend();
        db.insert_profile(&new_profile("u1", "rahim")).await.unwrap();
        let stored = db
            .insert_question(&new_question("abcd1234", "What is inertia?", &["গতি", "বল"], "u1"))
            .await
            .unwrap();
        assert_eq!(stored.tags, vec!["গতি", "বল"]);
        assert_eq!(stored.answer_count, 0);

        let fetched = db.get_question(&QuestionId("abcd1234".into())).await.unwrap();
        assert_eq!(fetched.question, stored);
        assert_eq!(fetched.author.unwrap().username, "rahim");
    }

    #[tokio::test]
    async fn test_duplicate_question_id_is_conflict() {
        let db = backend();
        let q = new_question("dup00001", "First title here", &["গতি"], "u1");
        db.insert_question(&q).await.unwrap();
        let err = db.insert_question(&q).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let db = backend();
        assert_eq!(
            db.get_question(&QuestionId("nope".into())).await.unwrap_err(),
            BackendError::NotFound
        );
        assert_eq!(
            db.get_profile(&UserId("ghost".into())).await.unwrap_err(),
            BackendError::NotFound
        );
        assert_eq!(
            db.increment_views(&QuestionId("nope".into())).await.unwrap_err(),
            BackendError::NotFound
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_tag_search_and_author() {
        let db = backend();
        db.insert_question(&new_question("q1", "Friction on slopes", &["ঘর্ষণ"], "u1"))
            .await
            .unwrap();
        db.insert_question(&new_question("q2", "Momentum in collisions", &["ভরবেগ", "গতি"], "u2"))
            .await
            .unwrap();
        db.insert_question(&new_question("q3", "Friction and heat", &["তাপ"], "u2"))
            .await
            .unwrap();

        let by_tag = db
            .list_questions(&QuestionQuery {
                tag: Some(slugify("গতি")),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].question.id.0, "q2");

        let by_search = db
            .list_questions(&QuestionQuery {
                search: Some("FRICTION".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = by_search.iter().map(|q| q.question.id.0.as_str()).collect();
        assert_eq!(ids, vec!["q3", "q1"], "newest first");

        let by_author = db
            .list_questions(&QuestionQuery {
                author: Some(UserId("u2".into())),
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].question.id.0, "q3");
    }

    #[tokio::test]
    async fn test_search_escapes_like_wildcards() {
        let db = backend();
        db.insert_question(&new_question("q1", "Plain title text", &[], "u1"))
            .await
            .unwrap();
        let rows = db
            .list_questions(&QuestionQuery {
                search: Some("%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_comments_newest_first_and_answer_count() {
        let db = backend();
        db.insert_question(&new_question("q1", "Question with comments", &[], "u1"))
            .await
            .unwrap();
        for body in ["first", "second", "third"] {
            db.insert_comment(&NewComment {
                question_id: QuestionId("q1".into()),
                author_id: UserId("u2".into()),
                body: body.to_string(),
            })
            .await
            .unwrap();
        }

        let comments = db.list_comments(&QuestionId("q1".into())).await.unwrap();
        let bodies: Vec<_> = comments.iter().map(|c| c.comment.body.as_str()).collect();
        assert_eq!(bodies, vec!["third", "second", "first"]);

        let q = db.get_question(&QuestionId("q1".into())).await.unwrap();
        assert_eq!(q.question.answer_count, 3);

        let unanswered = db
            .list_questions(&QuestionQuery {
                sort: QuestionSort::Unanswered,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(unanswered.is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_question_is_not_found() {
        let db = backend();
        let err = db
            .insert_comment(&NewComment {
                question_id: QuestionId("missing".into()),
                author_id: UserId("u1".into()),
                body: "hello".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::NotFound);
    }

    #[tokio::test]
    async fn test_tag_counts() {
        let db = backend();
        db.insert_question(&new_question("q1", "One question here", &["গতি", "বল"], "u1"))
            .await
            .unwrap();
        db.insert_question(&new_question("q2", "Two question here", &["গতি"], "u1"))
            .await
            .unwrap();

        let tags = db.list_tags(&TagQuery::default()).await.unwrap();
        assert_eq!(tags[0].name, "গতি");
        assert_eq!(tags[0].question_count, 2);
        assert_eq!(tags[1].name, "বল");
        assert_eq!(tags[1].question_count, 1);
    }

    #[tokio::test]
    async fn test_profile_update_and_username_conflict() {
        let db = backend();
        db.insert_profile(&new_profile("u1", "rahim")).await.unwrap();
        db.insert_profile(&new_profile("u2", "karim")).await.unwrap();

        let updated = db
            .update_profile(
                &UserId("u1".into()),
                &ProfileUpdate {
                    username: "rahim_phys".to_string(),
                    display_name: "Rahim".to_string(),
                    avatar_url: None,
                    bio: Some("Mechanics nerd".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "rahim_phys");
        assert_eq!(updated.bio.as_deref(), Some("Mechanics nerd"));

        let err = db
            .update_profile(
                &UserId("u2".into()),
                &ProfileUpdate {
                    username: "rahim_phys".to_string(),
                    display_name: "Karim".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));

        let found = db
            .list_profiles(&ProfileQuery {
                search: Some("phys".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.0, "u1");
    }

    #[test]
    fn test_schema_is_reentrant() {
        let db = backend();
        let conn = db.pool.get().unwrap();
        init_schema(&conn).unwrap();
        let version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }
}
