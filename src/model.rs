// Domain rows shared by the backends, controllers and views
//
// These mirror what the hosted database stores. The backend owns their
// integrity; the types here only carry data between layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-generated short question code (e.g. "aZ3kP9qR")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Profile id, equal to the auth identity id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub slug: String,
    pub author_id: UserId,
    pub votes: i64,
    pub views: i64,
    pub answer_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a question, composed locally before submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub id: QuestionId,
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub slug: String,
    pub author_id: UserId,
}

/// A question row joined with its author's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionWithAuthor {
    #[serde(flatten)]
    pub question: Question,
    pub author: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Name shown in bylines, falling back to the username
    pub fn shown_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Fields editable from the profile form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub question_id: QuestionId,
    pub author_id: UserId,
    pub body: String,
    pub votes: i64,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub question_id: QuestionId,
    pub author_id: UserId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<Profile>,
}

/// A tag with its derived question count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSummary {
    pub name: String,
    pub slug: String,
    pub question_count: i64,
}

/// Identity delivered by the auth service on a session change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}
