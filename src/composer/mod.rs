//! Question composer
//!
//! Per-client state machine behind the "ask a question" form:
//!
//! ```text
//! select_category ──→ suggestions (selection cleared on change)
//! toggle_tag      ──→ Added | Removed | Rejected(notice)
//! submit          ──→ validate ──→ id + slug ──→ one insert_question
//!                         │                          │
//!                         └─→ Invalid                ├─→ Created
//!                                                    ├─→ IdConflict
//!                                                    └─→ Failed
//! ```
//!
//! Blocked submissions never reach the backend.

pub mod draft;

use crate::backend::{Backend, BackendError};
use crate::catalog::{self, Category};
use crate::model::{NewQuestion, Question, QuestionId, UserId};
use crate::slug::slugify;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

/// Length of generated question ids
pub const QUESTION_ID_LEN: usize = 8;

/// Limits enforced before anything is sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub max_tags: usize,
    pub min_title_chars: usize,
    pub min_body_chars: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            max_tags: 3,
            min_title_chars: 10,
            min_body_chars: 20,
        }
    }
}

/// User-facing notices for rejected category/tag interactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    UnknownCategory(String),
    NoCategory,
    UnknownTag(String),
    TooManyTags(usize),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::UnknownCategory(name) => write!(f, "Unknown category: {}", name),
            Notice::NoCategory => write!(f, "Choose a category first"),
            Notice::UnknownTag(tag) => write!(f, "\"{}\" is not a tag of this category", tag),
            Notice::TooManyTags(max) => write!(f, "You can select at most {} tags", max),
        }
    }
}

/// First failing client-side rule, checked in this order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    TitleTooShort { min: usize },
    BodyTooShort { min: usize },
    MissingCategory,
    NoTags,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::TitleTooShort { min } => {
                write!(f, "Title must be at least {} characters", min)
            }
            ValidationError::BodyTooShort { min } => {
                write!(f, "Question body must be at least {} characters", min)
            }
            ValidationError::MissingCategory => write!(f, "Please choose a category"),
            ValidationError::NoTags => write!(f, "Please select at least one tag"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    Rejected(Notice),
}

/// One suggested tag and whether it is currently selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagChoice {
    pub name: &'static str,
    pub selected: bool,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Created(Question),
    Invalid(ValidationError),
    /// The generated id collided with an existing question
    IdConflict,
    Failed(BackendError),
}

/// Random 8-character alphanumeric question id
pub fn generate_question_id() -> QuestionId {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(QUESTION_ID_LEN)
        .map(char::from)
        .collect();
    QuestionId(id)
}

#[derive(Debug, Clone, Default)]
pub struct QuestionComposer {
    rules: Rules,
    category: Option<&'static Category>,
    selected: Vec<&'static str>,
}

impl QuestionComposer {
    pub fn new(rules: Rules) -> Self {
        Self {
            rules,
            category: None,
            selected: Vec::new(),
        }
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn category(&self) -> Option<&'static str> {
        self.category.map(|c| c.name)
    }

    /// Selected tags in the order they were picked
    pub fn selected(&self) -> &[&'static str] {
        &self.selected
    }

    pub fn select_category(&mut self, name: &str) -> Result<Vec<TagChoice>, Notice> {
        let category = catalog::category(name.trim())
            .ok_or_else(|| Notice::UnknownCategory(name.trim().to_string()))?;

        let changed = self.category.map(|c| c.name) != Some(category.name);
        if changed {
            self.selected.clear();
        }
        self.category = Some(category);
        Ok(self.suggestions())
    }

    /// Suggestions for the current category, in catalog order
    pub fn suggestions(&self) -> Vec<TagChoice> {
        let Some(category) = self.category else {
            return Vec::new();
        };
        category
            .tags
            .iter()
            .map(|&name| TagChoice {
                name,
                selected: self.selected.contains(&name),
            })
            .collect()
    }

    pub fn toggle_tag(&mut self, tag: &str) -> ToggleOutcome {
        let Some(category) = self.category else {
            return ToggleOutcome::Rejected(Notice::NoCategory);
        };
        let wanted = tag.trim();
        let Some(tag) = category.tags.iter().copied().find(|t| *t == wanted) else {
            return ToggleOutcome::Rejected(Notice::UnknownTag(wanted.to_string()));
        };

        if let Some(pos) = self.selected.iter().position(|&t| t == tag) {
            self.selected.remove(pos);
            ToggleOutcome::Removed
        } else if self.selected.len() < self.rules.max_tags {
            self.selected.push(tag);
            ToggleOutcome::Added
        } else {
            ToggleOutcome::Rejected(Notice::TooManyTags(self.rules.max_tags))
        }
    }

    /// Forget category and tags (after a successful submission)
    pub fn reset(&mut self) {
        self.category = None;
        self.selected.clear();
    }

    pub fn validate(&self, title: &str, body: &str) -> Result<(), ValidationError> {
        if title.trim().chars().count() < self.rules.min_title_chars {
            return Err(ValidationError::TitleTooShort {
                min: self.rules.min_title_chars,
            });
        }
        if body.trim().chars().count() < self.rules.min_body_chars {
            return Err(ValidationError::BodyTooShort {
                min: self.rules.min_body_chars,
            });
        }
        if self.category.is_none() {
            return Err(ValidationError::MissingCategory);
        }
        if self.selected.is_empty() {
            return Err(ValidationError::NoTags);
        }
        Ok(())
    }

    /// Validate and build the insert payload with a fresh id and slug
    pub fn compose(
        &self,
        title: &str,
        body: &str,
        author: &UserId,
    ) -> Result<NewQuestion, ValidationError> {
        self.validate(title, body)?;
        let category = self.category.ok_or(ValidationError::MissingCategory)?;

        let id = generate_question_id();
        let title = title.trim().to_string();
        let slug = match slugify(&title) {
            s if s.is_empty() => id.0.to_lowercase(),
            s => s,
        };

        Ok(NewQuestion {
            id,
            title,
            body: body.trim().to_string(),
            category: category.name.to_string(),
            tags: self.selected.iter().map(|t| t.to_string()).collect(),
            slug,
            author_id: author.clone(),
        })
    }

    /// Validate, then issue exactly one insert
    pub async fn submit(
        &self,
        backend: &dyn Backend,
        title: &str,
        body: &str,
        author: &UserId,
    ) -> SubmitOutcome {
        let question = match self.compose(title, body, author) {
            Ok(q) => q,
            Err(e) => return SubmitOutcome::Invalid(e),
        };

        match backend.insert_question(&question).await {
            Ok(created) => {
                tracing::info!(id = %created.id, slug = %created.slug, "Question created");
                SubmitOutcome::Created(created)
            }
            Err(BackendError::Conflict(detail)) => {
                tracing::warn!(id = %question.id, "Question id collision: {}", detail);
                SubmitOutcome::IdConflict
            }
            Err(e) => {
                tracing::error!(id = %question.id, "Failed to insert question: {}", e);
                SubmitOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::catalog::CATEGORIES;
    use crate::model::NewProfile;
    use crate::slug::is_slug_char;

    const MECHANICS: &str = "বলবিদ্যা";

    fn composer() -> QuestionComposer {
        QuestionComposer::new(Rules::default())
    }

    fn ready_composer() -> QuestionComposer {
        let mut c = composer();
        c.select_category(MECHANICS).unwrap();
        assert_eq!(c.toggle_tag("গতি"), ToggleOutcome::Added);
        c
    }

    #[test]
    fn test_every_category_renders_its_own_tags() {
        for category in CATEGORIES {
            let mut c = composer();
            let view = c.select_category(category.name).unwrap();
            let names: Vec<_> = view.iter().map(|t| t.name).collect();
            assert_eq!(names, category.tags.to_vec());
            assert!(view.iter().all(|t| !t.selected));
        }
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let mut c = composer();
        assert_eq!(
            c.select_category("জ্যোতিষ"),
            Err(Notice::UnknownCategory("জ্যোতিষ".to_string()))
        );
        assert_eq!(c.category(), None);
    }

    #[test]
    fn test_category_change_clears_selection() {
        let mut c = ready_composer();
        c.select_category(MECHANICS).unwrap();
        assert_eq!(c.selected(), &["গতি"]);

        c.select_category("তাপগতিবিদ্যা").unwrap();
        assert!(c.selected().is_empty());
    }

    #[test]
    fn test_double_toggle_restores_selection() {
        let mut c = ready_composer();
        c.toggle_tag("বল");
        let before: Vec<_> = c.selected().to_vec();

        assert_eq!(c.toggle_tag("ঘর্ষণ"), ToggleOutcome::Added);
        assert_eq!(c.toggle_tag("ঘর্ষণ"), ToggleOutcome::Removed);
        assert_eq!(c.selected(), before.as_slice());

        assert_eq!(c.toggle_tag("গতি"), ToggleOutcome::Removed);
        assert_eq!(c.toggle_tag("গতি"), ToggleOutcome::Added);
        let mut after = c.selected().to_vec();
        let mut expected = before.clone();
        after.sort();
        expected.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_fourth_tag_is_rejected() {
        let mut c = ready_composer();
        c.toggle_tag("বল");
        c.toggle_tag("ঘর্ষণ");
        let before = c.selected().to_vec();

        let outcome = c.toggle_tag("ভরবেগ");
        assert_eq!(outcome, ToggleOutcome::Rejected(Notice::TooManyTags(3)));
        assert_eq!(
            Notice::TooManyTags(3).to_string(),
            "You can select at most 3 tags"
        );
        assert_eq!(c.selected(), before.as_slice());
        assert!(c.selected().len() <= 3);
    }

    #[test]
    fn test_tags_outside_category_are_rejected() {
        let mut c = composer();
        assert_eq!(c.toggle_tag("গতি"), ToggleOutcome::Rejected(Notice::NoCategory));

        c.select_category(MECHANICS).unwrap();
        assert_eq!(
            c.toggle_tag("এনট্রপি"),
            ToggleOutcome::Rejected(Notice::UnknownTag("এনট্রপি".to_string()))
        );
        assert!(c.selected().is_empty());
    }

    #[test]
    fn test_suggestions_mark_selected() {
        let c = ready_composer();
        let view = c.suggestions();
        let selected: Vec<_> = view.iter().filter(|t| t.selected).map(|t| t.name).collect();
        assert_eq!(selected, vec!["গতি"]);
    }

    #[test]
    fn test_validation_order_and_boundaries() {
        let c = ready_composer();
        let body20 = "ক".repeat(20);

        assert_eq!(
            c.validate(&"ক".repeat(9), &body20),
            Err(ValidationError::TitleTooShort { min: 10 })
        );
        assert_eq!(c.validate(&"ক".repeat(10), &body20), Ok(()));

        assert_eq!(
            c.validate("a long enough title", &"x".repeat(19)),
            Err(ValidationError::BodyTooShort { min: 20 })
        );
        assert_eq!(c.validate("a long enough title", &"x".repeat(20)), Ok(()));

        // Whitespace does not count toward the minimum
        assert_eq!(
            c.validate(&format!("  {}  ", "a".repeat(9)), &body20),
            Err(ValidationError::TitleTooShort { min: 10 })
        );

        // Title is checked before body
        assert_eq!(
            c.validate("short", "short"),
            Err(ValidationError::TitleTooShort { min: 10 })
        );
    }

    #[test]
    fn test_validation_requires_category_and_tag() {
        let mut c = composer();
        assert_eq!(
            c.validate("a long enough title", &"x".repeat(20)),
            Err(ValidationError::MissingCategory)
        );
        c.select_category(MECHANICS).unwrap();
        assert_eq!(
            c.validate("a long enough title", &"x".repeat(20)),
            Err(ValidationError::NoTags)
        );
    }

    #[test]
    fn test_generated_ids() {
        for _ in 0..50 {
            let id = generate_question_id();
            assert_eq!(id.0.len(), QUESTION_ID_LEN);
            assert!(id.0.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_symbol_only_title_falls_back_to_id_slug() {
        let c = ready_composer();
        let q = c
            .compose("?!?!?!?!?!?!", &"x".repeat(25), &UserId("u1".into()))
            .unwrap();
        assert_eq!(q.slug, q.id.0.to_lowercase());
        assert!(q.slug.chars().all(is_slug_char));
    }

    async fn seeded_backend() -> RecordingBackend {
        let backend = RecordingBackend::new();
        backend
            .insert_profile(&NewProfile {
                id: UserId("author-1".into()),
                username: "rahim".into(),
                display_name: "Rahim".into(),
                avatar_url: None,
            })
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_submit_end_to_end() {
        let backend = seeded_backend().await;
        let mut c = composer();
        c.select_category(MECHANICS).unwrap();
        c.toggle_tag("গতি");
        c.toggle_tag("বল");

        let title = "টেস্ট প্রশ্ন শিরোনাম";
        let body = "A ball rolls down a ramp.";
        assert_eq!(body.chars().count(), 25);

        let outcome = c
            .submit(&backend, title, body, &UserId("author-1".into()))
            .await;
        let created = match outcome {
            SubmitOutcome::Created(q) => q,
            other => panic!("expected Created, got {:?}", other),
        };

        assert_eq!(backend.question_insert_count(), 1);
        let calls = backend.calls.lock().unwrap();
        let sent = &calls.question_inserts[0];
        assert_eq!(sent.title, title);
        assert_eq!(sent.body, body);
        assert_eq!(sent.category, MECHANICS);
        assert_eq!(sent.tags, vec!["গতি".to_string(), "বল".to_string()]);
        assert_eq!(sent.slug, "টেস্ট-প্রশ্ন-শিরোনাম");
        assert_eq!(sent.id.0.len(), QUESTION_ID_LEN);
        assert_eq!(created.id, sent.id);
    }

    #[tokio::test]
    async fn test_blocked_submissions_never_reach_backend() {
        let backend = seeded_backend().await;
        let author = UserId("author-1".into());

        let no_category = composer();
        let outcome = no_category
            .submit(&backend, "a long enough title", &"x".repeat(25), &author)
            .await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Invalid(ValidationError::MissingCategory)
        ));

        let c = ready_composer();
        let outcome = c.submit(&backend, "too short", &"x".repeat(25), &author).await;
        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
        let outcome = c
            .submit(&backend, "a long enough title", &"x".repeat(19), &author)
            .await;
        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));

        assert_eq!(backend.question_insert_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_and_failure_outcomes() {
        let backend = seeded_backend().await;
        let author = UserId("author-1".into());
        let c = ready_composer();

        *backend.fail_question_insert.lock().unwrap() =
            Some(BackendError::Conflict("duplicate key".into()));
        let outcome = c
            .submit(&backend, "a long enough title", &"x".repeat(25), &author)
            .await;
        assert!(matches!(outcome, SubmitOutcome::IdConflict));

        *backend.fail_question_insert.lock().unwrap() =
            Some(BackendError::Unavailable("connection refused".into()));
        let outcome = c
            .submit(&backend, "a long enough title", &"x".repeat(25), &author)
            .await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));

        // One attempt per submission, no automatic retry
        assert_eq!(backend.question_insert_count(), 2);
    }
}
