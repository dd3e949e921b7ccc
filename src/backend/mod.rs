//! Backend query/mutation surface
//!
//! Row-level reads and inserts against the named collections (questions,
//! comments, profiles, tags, question-tag associations). Two implementations
//! exist side by side:
//!
//! - [`sqlite::SqliteBackend`] - embedded SQLite behind an r2d2 pool
//! - [`rest::RestBackend`] - a PostgREST-style hosted database over HTTP
//!
//! ```text
//! Controller ──→ Arc<dyn Backend> ──┬──→ SqliteBackend (spawn_blocking + r2d2)
//!                                   └──→ RestBackend (reqwest)
//! ```
//!
//! Methods return boxed futures so the trait stays object safe.

pub mod rest;
pub mod sqlite;

#[cfg(test)]
pub mod testing;

use crate::model::{
    CommentWithAuthor, NewComment, NewProfile, NewQuestion, Profile, ProfileUpdate, Question,
    QuestionId, QuestionWithAuthor, TagSummary, UserId,
};
use futures::future::BoxFuture;
use serde::Deserialize;

/// Result alias for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend failures the controllers distinguish between
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No row matched a single-row read
    NotFound,
    /// Primary-key or unique constraint violation on insert/update
    Conflict(String),
    /// The backend understood the request but refused it
    Rejected { code: String, message: String },
    /// Transport, pool or driver failure
    Unavailable(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotFound => write!(f, "row not found"),
            BackendError::Conflict(what) => write!(f, "conflict: {}", what),
            BackendError::Rejected { code, message } => {
                write!(f, "rejected ({}): {}", code, message)
            }
            BackendError::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Ordering for question listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSort {
    /// Most recent first
    #[default]
    Newest,
    /// Highest vote count first
    Votes,
    /// Most viewed first
    Views,
    /// Questions without comments, most recent first
    Unanswered,
}

impl QuestionSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSort::Newest => "newest",
            QuestionSort::Votes => "votes",
            QuestionSort::Views => "views",
            QuestionSort::Unanswered => "unanswered",
        }
    }

    /// Parse a query-string value, falling back to newest
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "votes" => Self::Votes,
            "views" => Self::Views,
            "unanswered" => Self::Unanswered,
            _ => Self::Newest,
        }
    }
}

/// Filters and paging for question listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionQuery {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    /// Tag slug the question must carry
    pub tag: Option<String>,
    /// Only questions by this author
    pub author: Option<UserId>,
    pub sort: QuestionSort,
    pub limit: usize,
    pub offset: usize,
}

/// Filters and paging for profile listings (ordered by reputation)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileQuery {
    /// Substring of username or display name
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Filters for tag listings (ordered by question count)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagQuery {
    pub search: Option<String>,
    pub limit: usize,
}

/// The backend operations every controller is written against
pub trait Backend: Send + Sync {
    /// Short name for logs and the startup banner
    fn name(&self) -> &'static str;

    fn insert_question<'a>(&'a self, question: &'a NewQuestion) -> BoxFuture<'a, BackendResult<Question>>;

    fn get_question<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<QuestionWithAuthor>>;

    fn list_questions<'a>(
        &'a self,
        query: &'a QuestionQuery,
    ) -> BoxFuture<'a, BackendResult<Vec<QuestionWithAuthor>>>;

    fn increment_views<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<()>>;

    /// Comments on a question, newest first
    fn list_comments<'a>(
        &'a self,
        question_id: &'a QuestionId,
    ) -> BoxFuture<'a, BackendResult<Vec<CommentWithAuthor>>>;

    fn insert_comment<'a>(&'a self, comment: &'a NewComment) -> BoxFuture<'a, BackendResult<()>>;

    fn get_profile<'a>(&'a self, id: &'a UserId) -> BoxFuture<'a, BackendResult<Profile>>;

    fn get_profile_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, BackendResult<Profile>>;

    fn insert_profile<'a>(&'a self, profile: &'a NewProfile) -> BoxFuture<'a, BackendResult<Profile>>;

    fn update_profile<'a>(
        &'a self,
        id: &'a UserId,
        update: &'a ProfileUpdate,
    ) -> BoxFuture<'a, BackendResult<Profile>>;

    fn list_profiles<'a>(&'a self, query: &'a ProfileQuery) -> BoxFuture<'a, BackendResult<Vec<Profile>>>;

    fn list_tags<'a>(&'a self, query: &'a TagQuery) -> BoxFuture<'a, BackendResult<Vec<TagSummary>>>;
}
