//! Hosted backend over a PostgREST-style HTTP API
//!
//! Speaks the REST dialect exposed by hosted Postgres services:
//! `GET /rest/v1/<table>?col=eq.value&order=col.desc&limit=N`, inserts via
//! `POST` with `Prefer: return=representation`, and single-row reads with
//! the `application/vnd.pgrst.object+json` accept header.
//!
//! Error codes the controllers care about:
//! - `PGRST116` - single-row read matched no rows → [`BackendError::NotFound`]
//! - `23505` - unique violation (e.g. a duplicate question id) → [`BackendError::Conflict`]
//!
//! A question insert is two steps: the row itself, then its tag rows and
//! links. Once the row is stored the insert counts as done; a failed tag
//! step only delays the tag index and is logged.
//!
//! The hosted schema is expected to keep `questions.answer_count` in sync
//! with a trigger on `comments`, to expose a `tag_counts` view and an
//! `increment_question_views(question_id)` function.

use super::{
    Backend, BackendError, BackendResult, ProfileQuery, QuestionQuery, QuestionSort, TagQuery,
};
use crate::model::{
    CommentWithAuthor, NewComment, NewProfile, NewQuestion, Profile, ProfileUpdate, Question,
    QuestionId, QuestionWithAuthor, TagSummary, UserId,
};
use crate::slug::slugify;
use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NOT_FOUND_CODE: &str = "PGRST116";
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Map a non-2xx response to a [`BackendError`]
pub(crate) fn map_error(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<RestErrorBody>(body) {
        Ok(err) => {
            let code = err.code.unwrap_or_else(|| status.to_string());
            let message = err.message.unwrap_or_default();
            match code.as_str() {
                NOT_FOUND_CODE => BackendError::NotFound,
                UNIQUE_VIOLATION_CODE => BackendError::Conflict(message),
                _ => BackendError::Rejected { code, message },
            }
        }
        Err(_) => BackendError::Rejected {
            code: status.to_string(),
            message: body.to_string(),
        },
    }
}

/// PostgREST uses `*` as the ilike wildcard; reserved characters in the
/// term are dropped so user input cannot alter the filter grammar
fn ilike(term: &str) -> String {
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, '*' | ',' | '(' | ')' | '"'))
        .collect();
    format!("ilike.*{}*", cleaned.trim())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn push_paging(params: &mut Vec<(String, String)>, limit: usize, offset: usize) {
    if limit > 0 {
        params.push(("limit".into(), limit.to_string()));
    }
    if offset > 0 {
        params.push(("offset".into(), offset.to_string()));
    }
}

/// Query-string pairs for a question listing
pub(crate) fn question_list_params(query: &QuestionQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();

    let select = if non_empty(query.tag.as_deref()).is_some() {
        "*,author:profiles(*),question_tags!inner(tag_slug)"
    } else {
        "*,author:profiles(*)"
    };
    params.push(("select".into(), select.into()));

    if let Some(term) = non_empty(query.search.as_deref()) {
        params.push(("title".into(), ilike(term)));
    }
    if let Some(tag) = non_empty(query.tag.as_deref()) {
        params.push(("question_tags.tag_slug".into(), format!("eq.{}", tag)));
    }
    if let Some(author) = &query.author {
        params.push(("author_id".into(), format!("eq.{}", author.0)));
    }
    if query.sort == QuestionSort::Unanswered {
        params.push(("answer_count".into(), "eq.0".into()));
    }

    let order = match query.sort {
        QuestionSort::Newest | QuestionSort::Unanswered => "created_at.desc",
        QuestionSort::Votes => "votes.desc,created_at.desc",
        QuestionSort::Views => "views.desc,created_at.desc",
    };
    params.push(("order".into(), order.into()));
    push_paging(&mut params, query.limit, query.offset);
    params
}

/// Query-string pairs for a profile listing
pub(crate) fn profile_list_params(query: &ProfileQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(term) = non_empty(query.search.as_deref()) {
        let pattern = ilike(term);
        params.push((
            "or".into(),
            format!("(username.{pattern},display_name.{pattern})"),
        ));
    }
    params.push(("order".into(), "reputation.desc,created_at.asc".into()));
    push_paging(&mut params, query.limit, query.offset);
    params
}

/// Query-string pairs for the tag index
pub(crate) fn tag_list_params(query: &TagQuery) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        "name,slug,question_count".to_string(),
    )];
    if let Some(term) = non_empty(query.search.as_deref()) {
        let pattern = ilike(term);
        params.push(("or".into(), format!("(name.{pattern},slug.{pattern})")));
    }
    params.push(("order".into(), "question_count.desc,name.asc".into()));
    push_paging(&mut params, query.limit, 0);
    params
}

/// Client for a PostgREST-compatible hosted database
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// A request expecting exactly one row back
    fn single(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).header("Accept", SINGLE_OBJECT)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> BackendResult<T> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| BackendError::Unavailable(format!("Failed to decode response: {}", e)))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(map_error(status.as_u16(), &body))
        }
    }

    /// Upsert the question's tags and link them to it
    async fn link_tags(&self, question: &NewQuestion) -> BackendResult<()> {
        let tags: Vec<_> = question
            .tags
            .iter()
            .map(|name| (slugify(name), name))
            .filter(|(slug, _)| !slug.is_empty())
            .collect();
        if tags.is_empty() {
            return Ok(());
        }

        let tag_rows: Vec<_> = tags
            .iter()
            .map(|(slug, name)| json!({ "slug": slug, "name": name }))
            .collect();
        self.send_empty(
            self.request(Method::POST, "tags?on_conflict=slug")
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .json(&tag_rows),
        )
        .await?;

        let links: Vec<_> = tags
            .iter()
            .map(|(slug, _)| json!({ "question_id": question.id, "tag_slug": slug }))
            .collect();
        self.send_empty(
            self.request(Method::POST, "question_tags")
                .header("Prefer", "return=minimal")
                .json(&links),
        )
        .await
    }

    async fn send_empty(&self, req: RequestBuilder) -> BackendResult<()> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(map_error(status.as_u16(), &body))
        }
    }
}

impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn insert_question<'a>(&'a self, question: &'a NewQuestion) -> BoxFuture<'a, BackendResult<Question>> {
        async move {
            let stored: Question = self
                .fetch_json(
                    self.single(Method::POST, "questions")
                        .header("Prefer", "return=representation")
                        .json(question),
                )
                .await?;

            // The question row is the source of truth
            if let Err(e) = self.link_tags(question).await {
                tracing::warn!(
                    question = %question.id,
                    "Question stored but tag links failed: {}",
                    e
                );
            }

            Ok(stored)
        }
        .boxed()
    }

    fn get_question<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<QuestionWithAuthor>> {
        async move {
            self.fetch_json(self.single(Method::GET, "questions").query(&[
                ("select", "*,author:profiles(*)".to_string()),
                ("id", format!("eq.{}", id.0)),
            ]))
            .await
        }
        .boxed()
    }

    fn list_questions<'a>(
        &'a self,
        query: &'a QuestionQuery,
    ) -> BoxFuture<'a, BackendResult<Vec<QuestionWithAuthor>>> {
        async move {
            self.fetch_json(
                self.request(Method::GET, "questions")
                    .query(&question_list_params(query)),
            )
            .await
        }
        .boxed()
    }

    fn increment_views<'a>(&'a self, id: &'a QuestionId) -> BoxFuture<'a, BackendResult<()>> {
        async move {
            self.send_empty(
                self.request(Method::POST, "rpc/increment_question_views")
                    .json(&json!({ "question_id": id })),
            )
            .await
        }
        .boxed()
    }

    fn list_comments<'a>(
        &'a self,
        question_id: &'a QuestionId,
    ) -> BoxFuture<'a, BackendResult<Vec<CommentWithAuthor>>> {
        async move {
            self.fetch_json(self.request(Method::GET, "comments").query(&[
                ("select", "*,author:profiles(*)".to_string()),
                ("question_id", format!("eq.{}", question_id.0)),
                ("order", "created_at.desc,id.desc".to_string()),
            ]))
            .await
        }
        .boxed()
    }

    fn insert_comment<'a>(&'a self, comment: &'a NewComment) -> BoxFuture<'a, BackendResult<()>> {
        async move {
            self.send_empty(
                self.request(Method::POST, "comments")
                    .header("Prefer", "return=minimal")
                    .json(comment),
            )
            .await
        }
        .boxed()
    }

    fn get_profile<'a>(&'a self, id: &'a UserId) -> BoxFuture<'a, BackendResult<Profile>> {
        async move {
            self.fetch_json(
                self.single(Method::GET, "profiles")
                    .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id.0))]),
            )
            .await
        }
        .boxed()
    }

    fn get_profile_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, BackendResult<Profile>> {
        async move {
            self.fetch_json(self.single(Method::GET, "profiles").query(&[
                ("select", "*".to_string()),
                ("username", format!("eq.{}", username)),
            ]))
            .await
        }
        .boxed()
    }

    fn insert_profile<'a>(&'a self, profile: &'a NewProfile) -> BoxFuture<'a, BackendResult<Profile>> {
        async move {
            self.fetch_json(
                self.single(Method::POST, "profiles")
                    .header("Prefer", "return=representation")
                    .json(profile),
            )
            .await
        }
        .boxed()
    }

    fn update_profile<'a>(
        &'a self,
        id: &'a UserId,
        update: &'a ProfileUpdate,
    ) -> BoxFuture<'a, BackendResult<Profile>> {
        async move {
            self.fetch_json(
                self.single(Method::PATCH, "profiles")
                    .query(&[("id", format!("eq.{}", id.0))])
                    .header("Prefer", "return=representation")
                    .json(update),
            )
            .await
        }
        .boxed()
    }

    fn list_profiles<'a>(&'a self, query: &'a ProfileQuery) -> BoxFuture<'a, BackendResult<Vec<Profile>>> {
        async move {
            self.fetch_json(
                self.request(Method::GET, "profiles")
                    .query(&profile_list_params(query)),
            )
            .await
        }
        .boxed()
    }

    fn list_tags<'a>(&'a self, query: &'a TagQuery) -> BoxFuture<'a, BackendResult<Vec<TagSummary>>> {
        async move {
            self.fetch_json(
                self.request(Method::GET, "tag_counts")
                    .query(&tag_list_params(query)),
            )
            .await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn get<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_error_codes_map_to_backend_errors() {
        assert_eq!(
            map_error(406, r#"{"code":"PGRST116","message":"0 rows"}"#),
            BackendError::NotFound
        );
        assert_eq!(
            map_error(409, r#"{"code":"23505","message":"duplicate key"}"#),
            BackendError::Conflict("duplicate key".to_string())
        );
        assert_eq!(
            map_error(403, r#"{"code":"42501","message":"permission denied"}"#),
            BackendError::Rejected {
                code: "42501".to_string(),
                message: "permission denied".to_string()
            }
        );
    }

    #[test]
    fn test_unparseable_error_body_keeps_status() {
        assert_eq!(
            map_error(502, "Bad Gateway"),
            BackendError::Rejected {
                code: "502".to_string(),
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_question_params_default_listing() {
        let params = question_list_params(&QuestionQuery {
            limit: 20,
            ..Default::default()
        });
        assert_eq!(get(&params, "select"), Some("*,author:profiles(*)"));
        assert_eq!(get(&params, "order"), Some("created_at.desc"));
        assert_eq!(get(&params, "limit"), Some("20"));
        assert_eq!(get(&params, "offset"), None);
        assert_eq!(get(&params, "title"), None);
    }

    #[test]
    fn test_question_params_with_filters() {
        let params = question_list_params(&QuestionQuery {
            search: Some(" free*fall ".to_string()),
            tag: Some("গতি".to_string()),
            author: Some(UserId("u1".to_string())),
            sort: QuestionSort::Unanswered,
            limit: 10,
            offset: 30,
        });
        assert_eq!(get(&params, "title"), Some("ilike.*freefall*"));
        assert_eq!(get(&params, "question_tags.tag_slug"), Some("eq.গতি"));
        assert!(get(&params, "select").unwrap().contains("question_tags!inner"));
        assert_eq!(get(&params, "author_id"), Some("eq.u1"));
        assert_eq!(get(&params, "answer_count"), Some("eq.0"));
        assert_eq!(get(&params, "offset"), Some("30"));
    }

    #[test]
    fn test_profile_and_tag_params() {
        let params = profile_list_params(&ProfileQuery {
            search: Some("rah(im)".to_string()),
            limit: 5,
            offset: 0,
        });
        assert_eq!(
            get(&params, "or"),
            Some("(username.ilike.*rahim*,display_name.ilike.*rahim*)")
        );
        assert_eq!(get(&params, "order"), Some("reputation.desc,created_at.asc"));

        let params = tag_list_params(&TagQuery::default());
        assert_eq!(get(&params, "or"), None);
        assert_eq!(get(&params, "limit"), None);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let backend = RestBackend::new("https://db.example.com/", "key").unwrap();
        assert_eq!(
            backend.url("questions"),
            "https://db.example.com/rest/v1/questions"
        );
    }

    mod stub {
        use super::*;
        use axum::{routing::post, Json, Router};
        use std::sync::{Arc, Mutex};

        pub type Hits = Arc<Mutex<Vec<&'static str>>>;

        fn stored_row(mut body: serde_json::Value) -> serde_json::Value {
            body["votes"] = json!(0);
            body["views"] = json!(0);
            body["answer_count"] = json!(0);
            body["created_at"] = json!("2024-03-01T10:00:00Z");
            body["updated_at"] = json!("2024-03-01T10:00:00Z");
            body
        }

        /// PostgREST stand-in; each table answers with a fixed status
        pub async fn spawn(questions: StatusCode, tags: StatusCode) -> (RestBackend, Hits) {
            let hits: Hits = Arc::new(Mutex::new(Vec::new()));
            let (h1, h2, h3) = (hits.clone(), hits.clone(), hits.clone());
            let app = Router::new()
                .route(
                    "/rest/v1/questions",
                    post(move |Json(body): Json<serde_json::Value>| async move {
                        h1.lock().unwrap().push("questions");
                        if questions.is_success() {
                            (questions, Json(stored_row(body)))
                        } else {
                            (questions, Json(json!({ "code": "23505", "message": "duplicate key" })))
                        }
                    }),
                )
                .route(
                    "/rest/v1/tags",
                    post(move || async move {
                        h2.lock().unwrap().push("tags");
                        tags
                    }),
                )
                .route(
                    "/rest/v1/question_tags",
                    post(move || async move {
                        h3.lock().unwrap().push("question_tags");
                        StatusCode::CREATED
                    }),
                );

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.ok();
            });

            let backend = RestBackend::new(&format!("http://{}", addr), "test-key").unwrap();
            (backend, hits)
        }
    }

    fn new_question() -> NewQuestion {
        NewQuestion {
            id: QuestionId("aZ3kP9qR".to_string()),
            title: "Why does ice float on water?".to_string(),
            body: "Solids are usually denser.".to_string(),
            category: "তাপগতিবিদ্যা".to_string(),
            tags: vec!["ঘনত্ব".to_string()],
            slug: "why-does-ice-float-on-water".to_string(),
            author_id: UserId("u1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_question_links_tags() {
        let (backend, hits) = stub::spawn(StatusCode::CREATED, StatusCode::CREATED).await;
        let stored = backend.insert_question(&new_question()).await.unwrap();
        assert_eq!(stored.id, QuestionId("aZ3kP9qR".to_string()));
        assert_eq!(stored.tags, vec!["ঘনত্ব".to_string()]);
        assert_eq!(*hits.lock().unwrap(), vec!["questions", "tags", "question_tags"]);
    }

    #[tokio::test]
    async fn test_tag_failure_keeps_stored_question() {
        let (backend, hits) =
            stub::spawn(StatusCode::CREATED, StatusCode::INTERNAL_SERVER_ERROR).await;
        let stored = backend.insert_question(&new_question()).await.unwrap();
        assert_eq!(stored.title, "Why does ice float on water?");
        // Links are skipped once the tag upsert fails
        assert_eq!(*hits.lock().unwrap(), vec!["questions", "tags"]);
    }

    #[tokio::test]
    async fn test_duplicate_question_id_is_a_conflict() {
        let (backend, hits) = stub::spawn(StatusCode::CONFLICT, StatusCode::CREATED).await;
        let result = backend.insert_question(&new_question()).await;
        assert_eq!(result.unwrap_err(), BackendError::Conflict("duplicate key".to_string()));
        assert_eq!(*hits.lock().unwrap(), vec!["questions"]);
    }
}
