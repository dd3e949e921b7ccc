// Test double: wraps an in-memory SQLite backend and records mutations
//
// Lets controller tests assert how many backend writes a flow issued and
// inject failures for specific operations.

use super::sqlite::SqliteBackend;
use super::{Backend, BackendError, BackendResult, ProfileQuery, QuestionQuery, TagQuery};
use crate::model::{
    CommentWithAuthor, NewComment, NewProfile, NewQuestion, Profile, ProfileUpdate, Question,
    QuestionId, QuestionWithAuthor, TagSummary, UserId,
};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct Calls {
    pub question_inserts: Vec<NewQuestion>,
    pub comment_inserts: Vec<NewComment>,
    pub profile_inserts: Vec<NewProfile>,
    pub profile_reads: usize,
}

pub struct RecordingBackend {
    inner: SqliteBackend,
    pub calls: Mutex<Calls>,
    /// Error returned by every question insert (instead of writing)
    pub fail_question_insert: Mutex<Option<BackendError>>,
    /// Error returned by every profile read (instead of reading)
    pub fail_profile_read: Mutex<Option<BackendError>>,
    /// Error returned by every question listing
    pub fail_listing: Mutex<Option<BackendError>>,
    /// Pause before each question insert completes
    pub insert_delay: Mutex<Option<Duration>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: SqliteBackend::in_memory().expect("in-memory sqlite"),
            calls: Mutex::new(Calls::default()),
            fail_question_insert: Mutex::new(None),
            fail_profile_read: Mutex::new(None),
            fail_listing: Mutex::new(None),
            insert_delay: Mutex::new(None),
        }
    }

    pub fn question_insert_count(&self) -> usize {
        self.calls.lock().unwrap().question_inserts.len()
    }

    pub fn profile_insert_count(&self) -> usize {
        self.calls.lock().unwrap().profile_inserts.len()
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn insert_question<'a>(&'a self, question: &'a NewQuestion) -> BoxFuture<'a, BackendResult<Question>> {
        self.calls
            .lock()
            .unwrap()
            .question_inserts
            .push(question.clone());
        let injected = self.fail_question_insert.lock().unwrap().clone();
        let delay = *self.insert_delay.lock().unwrap();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match injected {
                Some(err) => Err(err),
                None => self.inner.insert_question(question).await,
            }
        }
        .boxed()
    }

    fn get_question<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<QuestionWithAuthor>> {
        self.inner.get_question(id)
    }

    fn list_questions<'a>(
        &'a self,
        query: &'a QuestionQuery,
    ) -> BoxFuture<'a, BackendResult<Vec<QuestionWithAuthor>>> {
        let injected = self.fail_listing.lock().unwrap().clone();
        async move {
            match injected {
                Some(err) => Err(err),
                None => self.inner.list_questions(query).await,
            }
        }
        .boxed()
    }

    fn increment_views<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<()>> {
        self.inner.increment_views(id)
    }

    fn list_comments<'a>(
        &'a self,
        question_id: &'a QuestionId,
    ) -> BoxFuture<'a, BackendResult<Vec<CommentWithAuthor>>> {
        self.inner.list_comments(question_id)
    }

    fn insert_comment<'a>(&'a self, comment: &'a NewComment) -> BoxFuture<'a, BackendResult<()>> {
        self.calls
            .lock()
            .unwrap()
            .comment_inserts
            .push(comment.clone());
        self.inner.insert_comment(comment)
    }

    fn get_profile<'a>(&'a self, id: &'a UserId) -> BoxFuture<'a, BackendResult<Profile>> {
        self.calls.lock().unwrap().profile_reads += 1;
        let injected = self.fail_profile_read.lock().unwrap().clone();
        async move {
            match injected {
                Some(err) => Err(err),
                None => self.inner.get_profile(id).await,
            }
        }
        .boxed()
    }

    fn get_profile_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, BackendResult<Profile>> {
        self.inner.get_profile_by_username(username)
    }

    fn insert_profile<'a>(&'a self, profile: &'a NewProfile) -> BoxFuture<'a, BackendResult<Profile>> {
        self.calls
            .lock()
            .unwrap()
            .profile_inserts
            .push(profile.clone());
        self.inner.insert_profile(profile)
    }

    fn update_profile<'a>(
        &'a self,
        id: &'a UserId,
        update: &'a ProfileUpdate,
    ) -> BoxFuture<'a, BackendResult<Profile>> {
        self.inner.update_profile(id, update)
    }

    fn list_profiles<'a>(&'a self, query: &'a ProfileQuery) -> BoxFuture<'a, BackendResult<Vec<Profile>>> {
        self.inner.list_profiles(query)
    }

    fn list_tags<'a>(&'a self, query: &'a TagQuery) -> BoxFuture<'a, BackendResult<Vec<TagSummary>>> {
        self.inner.list_tags(query)
    }
}
