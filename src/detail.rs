// Detail page controller - one question, its comments, the comment form
//
// The view count bump is best-effort: a failure is logged and the page
// renders anyway. After a comment is posted the whole list is fetched
// again rather than appending locally.

use crate::auth::AuthController;
use crate::backend::{Backend, BackendError};
use crate::model::{NewComment, QuestionId};
use crate::view::{
    comment_view, markdown::render_markdown, question_card, CommentForm, CommentView, DetailView,
    LOAD_FAILED,
};
use chrono::{DateTime, Utc};

pub const SIGN_IN_TO_COMMENT: &str = "Sign in to comment";
pub const EMPTY_COMMENT: &str = "Your answer cannot be empty";
pub const COMMENT_FAILED: &str = "Could not post your answer. Please try again.";

#[derive(Debug)]
pub enum DetailPage {
    Found(Box<DetailView>),
    NotFound,
    Failed,
}

/// What happened to a comment submission
#[derive(Debug)]
pub enum CommentOutcome {
    Posted,
    NotSignedIn,
    Empty,
    Failed(BackendError),
}

impl CommentOutcome {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            CommentOutcome::Posted => None,
            CommentOutcome::NotSignedIn => Some(SIGN_IN_TO_COMMENT),
            CommentOutcome::Empty => Some(EMPTY_COMMENT),
            CommentOutcome::Failed(_) => Some(COMMENT_FAILED),
        }
    }
}

async fn comments_section(
    backend: &dyn Backend,
    id: &QuestionId,
    now: DateTime<Utc>,
) -> Result<Vec<CommentView>, String> {
    match backend.list_comments(id).await {
        Ok(rows) => Ok(rows.iter().map(|r| comment_view(r, now)).collect()),
        Err(e) => {
            tracing::error!(question = %id, "Failed to load comments: {}", e);
            Err(LOAD_FAILED.to_string())
        }
    }
}

/// Load the page for `/question?id=`; `count_view` bumps the view counter
pub async fn load(
    backend: &dyn Backend,
    id: &QuestionId,
    auth: &AuthController,
    count_view: bool,
    now: DateTime<Utc>,
) -> DetailPage {
    let row = match backend.get_question(id).await {
        Ok(row) => row,
        Err(BackendError::NotFound) => return DetailPage::NotFound,
        Err(e) => {
            tracing::error!(question = %id, "Failed to load question: {}", e);
            return DetailPage::Failed;
        }
    };

    if count_view {
        if let Err(e) = backend.increment_views(id).await {
            tracing::warn!(question = %id, "Failed to count view: {}", e);
        }
    }

    let comments = comments_section(backend, id, now).await;
    DetailPage::Found(Box::new(DetailView {
        id: id.clone(),
        card: question_card(&row, now),
        body_html: render_markdown(&row.question.body),
        comments,
        form: CommentForm {
            signed_in: auth.user_id().is_some(),
            body: String::new(),
            notice: None,
        },
    }))
}

/// Post a comment as the signed-in user
pub async fn post_comment(
    backend: &dyn Backend,
    auth: &AuthController,
    id: &QuestionId,
    body: &str,
) -> CommentOutcome {
    let Some(author) = auth.user_id() else {
        return CommentOutcome::NotSignedIn;
    };
    let body = body.trim();
    if body.is_empty() {
        return CommentOutcome::Empty;
    }

    let comment = NewComment {
        question_id: id.clone(),
        author_id: author.clone(),
        body: body.to_string(),
    };
    match backend.insert_comment(&comment).await {
        Ok(()) => {
            tracing::info!(question = %id, author = %author, "Comment posted");
            CommentOutcome::Posted
        }
        Err(e) => {
            tracing::error!(question = %id, "Failed to post comment: {}", e);
            CommentOutcome::Failed(e)
        }
    }
}
