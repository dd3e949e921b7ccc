//! Pure data → view mapping
//!
//! Controllers hand backend rows to the functions here and get plain view
//! structs back; [`html`] turns those into markup. Nothing in this module
//! touches the backend or the client store, so every mapping is testable
//! with literal rows.

pub mod html;
pub mod markdown;

use crate::catalog::CATEGORIES;
use crate::composer::{QuestionComposer, TagChoice};
use crate::model::{CommentWithAuthor, Profile, QuestionId, QuestionWithAuthor, TagSummary};
use crate::slug::slugify;
use crate::util::{encode_query_value, excerpt, format_compact_number, query_string, time_ago};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Inline message shown when a page section could not be loaded
pub const LOAD_FAILED: &str = "Could not load this section right now. Please try again later.";

const EXCERPT_CHARS: usize = 160;
const UNKNOWN_AUTHOR: &str = "Unknown user";

pub fn question_href(id: &QuestionId) -> String {
    format!("/question?id={}", encode_query_value(&id.0))
}

/// Form action for posting an answer under a question
pub fn question_comment_href(id: &QuestionId) -> String {
    format!("/question/comment?id={}", encode_query_value(&id.0))
}

pub fn user_href(username: &str) -> String {
    format!("/user?username={}", encode_query_value(username))
}

pub fn tag_href(tag_slug: &str) -> String {
    format!("/?tag={}", encode_query_value(tag_slug))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub label: String,
    pub href: String,
}

/// Byline for a question or comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Byline {
    pub name: String,
    pub href: Option<String>,
    pub avatar_url: Option<String>,
    pub when: String,
}

fn byline(author: Option<&Profile>, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Byline {
    Byline {
        name: author
            .map(|p| p.shown_name().to_string())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        href: author.map(|p| user_href(&p.username)),
        avatar_url: author.and_then(|p| p.avatar_url.clone()),
        when: time_ago(created_at, now),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionCard {
    pub title: String,
    pub href: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<Link>,
    pub votes: String,
    pub views: String,
    pub answers: String,
    pub answered: bool,
    pub byline: Byline,
}

pub fn question_card(row: &QuestionWithAuthor, now: DateTime<Utc>) -> QuestionCard {
    let q = &row.question;
    QuestionCard {
        title: q.title.clone(),
        href: question_href(&q.id),
        excerpt: excerpt(&q.body, EXCERPT_CHARS),
        category: q.category.clone(),
        tags: q
            .tags
            .iter()
            .map(|name| Link {
                label: name.clone(),
                href: tag_href(&slugify(name)),
            })
            .collect(),
        votes: format_compact_number(q.votes),
        views: format_compact_number(q.views),
        answers: format_compact_number(q.answer_count),
        answered: q.answer_count > 0,
        byline: byline(row.author.as_ref(), q.created_at, now),
    }
}

/// Previous/next links preserving the other query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: usize,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

pub fn pager(path: &str, params: &[(&str, &str)], page: usize, has_next: bool) -> Pager {
    let href = |target: usize| {
        let target = target.to_string();
        let mut pairs: Vec<(&str, &str)> = params
            .iter()
            .copied()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if target != "1" {
            pairs.push(("page", &target));
        }
        if pairs.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query_string(&pairs))
        }
    };

    Pager {
        page,
        prev_href: (page > 1).then(|| href(page - 1)),
        next_href: has_next.then(|| href(page + 1)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    pub heading: String,
    pub sort: &'static str,
    pub search: String,
    pub tag: String,
    pub cards: Vec<QuestionCard>,
    pub pager: Pager,
}

impl FeedView {
    pub fn empty_message(&self) -> &'static str {
        if self.search.is_empty() && self.tag.is_empty() {
            "No questions yet. Be the first to ask!"
        } else {
            "No questions match your filters."
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRow {
    pub name: String,
    pub href: String,
    pub count: String,
}

pub fn tag_row(tag: &TagSummary) -> TagRow {
    TagRow {
        name: tag.name.clone(),
        href: tag_href(&tag.slug),
        count: format_compact_number(tag.question_count),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub username: String,
    pub display_name: String,
    pub href: String,
    pub avatar_url: Option<String>,
    pub reputation: String,
    pub joined: String,
}

pub fn user_row(profile: &Profile, now: DateTime<Utc>) -> UserRow {
    UserRow {
        username: profile.username.clone(),
        display_name: profile.shown_name().to_string(),
        href: user_href(&profile.username),
        avatar_url: profile.avatar_url.clone(),
        reputation: format_compact_number(profile.reputation),
        joined: time_ago(profile.created_at, now),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub user: UserRow,
    pub bio: Option<String>,
    /// The signed-in user is looking at their own profile
    pub editable: bool,
    pub edit_form: Option<ProfileForm>,
    pub questions: Result<Vec<QuestionCard>, String>,
}

/// Values shown in the profile edit form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileForm {
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
    pub error: Option<String>,
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub body_html: String,
    pub votes: String,
    pub accepted: bool,
    pub byline: Byline,
}

pub fn comment_view(row: &CommentWithAuthor, now: DateTime<Utc>) -> CommentView {
    CommentView {
        body_html: markdown::render_markdown(&row.comment.body),
        votes: format_compact_number(row.comment.votes),
        accepted: row.comment.accepted,
        byline: byline(row.author.as_ref(), row.comment.created_at, now),
    }
}

/// State of the comment form under a question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentForm {
    pub signed_in: bool,
    pub body: String,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub id: QuestionId,
    pub card: QuestionCard,
    pub body_html: String,
    pub comments: Result<Vec<CommentView>, String>,
    pub form: CommentForm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOption {
    pub name: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposerView {
    pub title: String,
    pub body: String,
    pub categories: Vec<CategoryOption>,
    pub suggestions: Vec<TagChoice>,
    pub max_tags: usize,
    /// Inline notice from a category/tag interaction
    pub notice: Option<String>,
    /// Submission error shown above the form
    pub error: Option<String>,
    pub draft_restored: bool,
}

pub fn composer_view(composer: &QuestionComposer, title: &str, body: &str) -> ComposerView {
    let current = composer.category();
    ComposerView {
        title: title.to_string(),
        body: body.to_string(),
        categories: CATEGORIES
            .iter()
            .map(|c| CategoryOption {
                name: c.name,
                selected: current == Some(c.name),
            })
            .collect(),
        suggestions: composer.suggestions(),
        max_tags: composer.rules().max_tags,
        notice: None,
        error: None,
        draft_restored: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Rules;
    use crate::model::{Comment, Question, UserId};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn profile() -> Profile {
        Profile {
            id: UserId("u1".into()),
            username: "rahim".into(),
            display_name: "".into(),
            avatar_url: Some("https://img.example.com/r.png".into()),
            bio: None,
            reputation: 1_250,
            created_at: now() - Duration::days(3),
        }
    }

    fn row() -> QuestionWithAuthor {
        QuestionWithAuthor {
            question: Question {
                id: QuestionId("aZ3kP9qR".into()),
                title: "টেস্ট প্রশ্ন শিরোনাম".into(),
                body: "x".repeat(300),
                category: "বলবিদ্যা".into(),
                tags: vec!["গতি".into(), "কাজ ও শক্তি".into()],
                slug: "টেস্ট-প্রশ্ন-শিরোনাম".into(),
                author_id: UserId("u1".into()),
                votes: 12,
                views: 4_321,
                answer_count: 0,
                created_at: now() - Duration::minutes(5),
                updated_at: now() - Duration::minutes(5),
            },
            author: Some(profile()),
        }
    }

    #[test]
    fn test_question_card() {
        let card = question_card(&row(), now());
        assert_eq!(card.href, "/question?id=aZ3kP9qR");
        assert_eq!(card.views, "4K");
        assert!(!card.answered);
        assert_eq!(card.excerpt.chars().count(), EXCERPT_CHARS + 1);
        assert_eq!(card.tags[1].label, "কাজ ও শক্তি");
        assert_eq!(card.tags[1].href, tag_href("কাজ-ও-শক্তি"));
        assert_eq!(card.byline.name, "rahim");
        assert_eq!(card.byline.href.as_deref(), Some("/user?username=rahim"));
        assert_eq!(card.byline.when, "5 minutes ago");
    }

    #[test]
    fn test_card_without_author() {
        let mut r = row();
        r.author = None;
        let card = question_card(&r, now());
        assert_eq!(card.byline.name, UNKNOWN_AUTHOR);
        assert_eq!(card.byline.href, None);
    }

    #[test]
    fn test_pager_links() {
        let p = pager("/", &[("sort", "votes"), ("q", "")], 1, true);
        assert_eq!(p.prev_href, None);
        assert_eq!(p.next_href.as_deref(), Some("/?sort=votes&page=2"));

        let p = pager("/", &[("sort", "votes")], 2, false);
        assert_eq!(p.prev_href.as_deref(), Some("/?sort=votes"));
        assert_eq!(p.next_href, None);

        let p = pager("/", &[], 3, false);
        assert_eq!(p.prev_href.as_deref(), Some("/?page=2"));

        let p = pager("/users", &[("q", "a&b=c গ")], 1, true);
        assert_eq!(
            p.next_href.as_deref(),
            Some("/users?q=a%26b%3Dc%20%E0%A6%97&page=2")
        );
    }

    #[test]
    fn test_comment_view_renders_markdown() {
        let row = CommentWithAuthor {
            comment: Comment {
                id: 1,
                question_id: QuestionId("aZ3kP9qR".into()),
                author_id: UserId("u1".into()),
                body: "Use *F = ma* <b>here</b>".into(),
                votes: 2,
                accepted: true,
                created_at: now() - Duration::hours(2),
            },
            author: Some(profile()),
        };
        let view = comment_view(&row, now());
        assert!(view.body_html.contains("<em>F = ma</em>"));
        assert!(!view.body_html.contains("<b>"));
        assert!(view.accepted);
        assert_eq!(view.byline.when, "2 hours ago");
    }

    #[test]
    fn test_composer_view_marks_current_category() {
        let mut composer = QuestionComposer::new(Rules::default());
        composer.select_category("তাপগতিবিদ্যা").unwrap();
        composer.toggle_tag("তাপ");

        let view = composer_view(&composer, "t", "b");
        let selected: Vec<_> = view
            .categories
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.name)
            .collect();
        assert_eq!(selected, vec!["তাপগতিবিদ্যা"]);
        assert_eq!(view.suggestions.len(), 4);
        assert!(view.suggestions[0].selected);
        assert_eq!(view.max_tags, 3);
    }

    #[test]
    fn test_user_row_and_tag_row() {
        let row = user_row(&profile(), now());
        assert_eq!(row.display_name, "rahim");
        assert_eq!(row.reputation, "1K");
        assert_eq!(row.joined, "3 days ago");

        let tag = tag_row(&TagSummary {
            name: "গতি".into(),
            slug: "গতি".into(),
            question_count: 7,
        });
        assert_eq!(tag.count, "7");
        assert_eq!(tag.href, tag_href("গতি"));
    }
}
