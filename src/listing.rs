//! Listing renderers
//!
//! Home feed, tag index, user index, profile page and the featured list.
//! Each one translates request parameters into a backend query, maps the
//! rows to view structs and hands them back for rendering. Backend errors
//! are logged here and surface as an inline message in the affected
//! section only.
//!
//! Paging fetches one row beyond the page size to learn whether a next
//! page exists.

use crate::backend::{
    Backend, BackendError, BackendResult, ProfileQuery, QuestionQuery, QuestionSort, TagQuery,
};
use crate::model::{Profile, UserId};
use crate::store::{ClientId, ClientStore, StoreError, FEATURED_KEY};
use crate::view::{
    self, pager, question_card, tag_row, user_row, FeedView, ProfileForm, ProfileView,
    QuestionCard, TagRow, UserRow, LOAD_FAILED,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

const TAG_LIMIT: usize = 200;

/// Highest page number served; larger requests land on this page
pub const MAX_PAGE: usize = 1_000;

fn clamp_page(page: Option<usize>) -> usize {
    page.unwrap_or(1).clamp(1, MAX_PAGE)
}

/// Row offset of a page; `None` when it does not fit in a `usize`
fn page_offset(page: usize, page_size: usize) -> Option<usize> {
    (page - 1).checked_mul(page_size)
}

/// Query parameters accepted by the home feed (and its live stream)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedParams {
    pub page: Option<usize>,
    pub sort: Option<String>,
    pub q: Option<String>,
    pub tag: Option<String>,
}

impl FeedParams {
    pub fn page(&self) -> usize {
        clamp_page(self.page)
    }

    pub fn sort(&self) -> QuestionSort {
        self.sort
            .as_deref()
            .map(QuestionSort::parse)
            .unwrap_or_default()
    }

    fn search(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or("")
    }

    fn tag(&self) -> &str {
        self.tag.as_deref().map(str::trim).unwrap_or("")
    }

    /// Backend query for this page, one row over the page size
    ///
    /// `None` when the page lies beyond any addressable row.
    pub fn to_query(&self, page_size: usize) -> Option<QuestionQuery> {
        Some(QuestionQuery {
            search: Some(self.search().to_string()).filter(|s| !s.is_empty()),
            tag: Some(self.tag().to_string()).filter(|s| !s.is_empty()),
            author: None,
            sort: self.sort(),
            limit: page_size.checked_add(1)?,
            offset: page_offset(self.page(), page_size)?,
        })
    }
}

/// Query parameters for the tag and user indexes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<usize>,
}

impl SearchParams {
    pub fn search(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn page(&self) -> usize {
        clamp_page(self.page)
    }
}

/// Drop the look-ahead row, reporting whether it was there
fn split_page<T>(mut rows: Vec<T>, page_size: usize) -> (Vec<T>, bool) {
    let has_next = rows.len() > page_size;
    rows.truncate(page_size);
    (rows, has_next)
}

fn degrade<T>(section: &str, result: BackendResult<T>) -> Result<T, String> {
    result.map_err(|e| {
        tracing::error!(section, "Failed to load listing: {}", e);
        LOAD_FAILED.to_string()
    })
}

pub async fn home_feed(
    backend: &dyn Backend,
    params: &FeedParams,
    page_size: usize,
    now: DateTime<Utc>,
) -> Result<FeedView, String> {
    let (rows, has_next) = match params.to_query(page_size) {
        Some(query) => split_page(degrade("feed", backend.list_questions(&query).await)?, page_size),
        None => (Vec::new(), false),
    };

    let sort = params.sort().as_str();
    let heading = match (params.tag(), params.sort()) {
        ("", QuestionSort::Unanswered) => "Unanswered questions".to_string(),
        ("", _) => "All questions".to_string(),
        (tag, _) => format!("Questions tagged [{}]", tag),
    };

    Ok(FeedView {
        heading,
        sort,
        search: params.search().to_string(),
        tag: params.tag().to_string(),
        cards: rows.iter().map(|r| question_card(r, now)).collect(),
        pager: pager(
            "/",
            &[("sort", sort), ("q", params.search()), ("tag", params.tag())],
            params.page(),
            has_next,
        ),
    })
}

pub async fn tag_index(backend: &dyn Backend, params: &SearchParams) -> Result<Vec<TagRow>, String> {
    let query = TagQuery {
        search: Some(params.search().to_string()).filter(|s| !s.is_empty()),
        limit: TAG_LIMIT,
    };
    let tags = degrade("tags", backend.list_tags(&query).await)?;
    Ok(tags.iter().map(tag_row).collect())
}

pub async fn user_index(
    backend: &dyn Backend,
    params: &SearchParams,
    page_size: usize,
    now: DateTime<Utc>,
) -> (Result<Vec<UserRow>, String>, view::Pager) {
    let Some(offset) = page_offset(params.page(), page_size) else {
        let pager_view = pager("/users", &[("q", params.search())], params.page(), false);
        return (Ok(Vec::new()), pager_view);
    };
    let query = ProfileQuery {
        search: Some(params.search().to_string()).filter(|s| !s.is_empty()),
        limit: page_size.saturating_add(1),
        offset,
    };
    match degrade("users", backend.list_profiles(&query).await) {
        Ok(rows) => {
            let (rows, has_next) = split_page(rows, page_size);
            let pager_view = pager("/users", &[("q", params.search())], params.page(), has_next);
            (Ok(rows.iter().map(|p| user_row(p, now)).collect()), pager_view)
        }
        Err(message) => (Err(message), view::Pager::default()),
    }
}

/// Profile page outcome
#[derive(Debug)]
pub enum ProfilePage {
    Found(Box<ProfileView>),
    NotFound,
    Failed(String),
}

pub async fn profile_page(
    backend: &dyn Backend,
    username: &str,
    viewer: Option<&UserId>,
    page_size: usize,
    now: DateTime<Utc>,
) -> ProfilePage {
    let profile = match backend.get_profile_by_username(username.trim()).await {
        Ok(profile) => profile,
        Err(BackendError::NotFound) => return ProfilePage::NotFound,
        Err(e) => {
            tracing::error!(username, "Failed to load profile: {}", e);
            return ProfilePage::Failed(LOAD_FAILED.to_string());
        }
    };

    let query = QuestionQuery {
        author: Some(profile.id.clone()),
        sort: QuestionSort::Newest,
        limit: page_size,
        ..Default::default()
    };
    let questions = degrade("profile questions", backend.list_questions(&query).await)
        .map(|rows| rows.iter().map(|r| question_card(r, now)).collect());

    ProfilePage::Found(Box::new(profile_view(&profile, viewer, questions, now)))
}

pub fn profile_view(
    profile: &Profile,
    viewer: Option<&UserId>,
    questions: Result<Vec<QuestionCard>, String>,
    now: DateTime<Utc>,
) -> ProfileView {
    let editable = viewer == Some(&profile.id);
    ProfileView {
        user: user_row(profile, now),
        bio: profile.bio.clone().filter(|b| !b.trim().is_empty()),
        editable,
        edit_form: editable.then(|| ProfileForm::from_profile(profile)),
        questions,
    }
}

/// Top questions by votes
pub async fn featured_cards(
    backend: &dyn Backend,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<QuestionCard>, String> {
    let query = QuestionQuery {
        sort: QuestionSort::Votes,
        limit,
        ..Default::default()
    };
    let rows = degrade("featured", backend.list_questions(&query).await)?;
    Ok(rows.iter().map(|r| question_card(r, now)).collect())
}

/// Result of checking a freshly rendered featured fragment against the
/// client's stored copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeaturedOutcome {
    /// Differs from what the client has; send it
    Changed { html: String, etag: String },
    /// Byte-identical to the stored fragment
    Unchanged { etag: String },
}

pub fn fragment_etag(html: &str) -> String {
    let digest = Sha256::digest(html.as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    format!("\"{}\"", hex)
}

/// Per-client cache of the last featured fragment sent
pub struct FeaturedCache<'a> {
    store: &'a ClientStore,
}

impl<'a> FeaturedCache<'a> {
    pub fn new(store: &'a ClientStore) -> Self {
        Self { store }
    }

    /// Compare with the stored fragment and remember the new one when it differs
    pub fn refresh(&self, client: &ClientId, html: String) -> Result<FeaturedOutcome, StoreError> {
        let etag = fragment_etag(&html);
        let previous = self.store.get(client, FEATURED_KEY)?;
        if previous.as_deref() == Some(html.as_str()) {
            return Ok(FeaturedOutcome::Unchanged { etag });
        }
        self.store.set(client, FEATURED_KEY, &html)?;
        Ok(FeaturedOutcome::Changed { html, etag })
    }
}
