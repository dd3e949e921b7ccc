// JSON endpoints - catalog, question listing, health
//
// Read-only and unauthenticated; the same data the HTML pages show.

use super::AppState;
use crate::backend::BackendError;
use crate::catalog::{Category, CATEGORIES};
use crate::config::VERSION;
use crate::listing::FeedParams;
use crate::model::QuestionWithAuthor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    Upstream(String),
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        tracing::error!("API error: {} - {}", status, message);

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// The category → tag table
pub(super) async fn categories() -> Json<&'static [Category]> {
    Json(CATEGORIES)
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub page: usize,
    pub has_next: bool,
    pub questions: Vec<QuestionWithAuthor>,
}

/// Same filters as the home feed
pub(super) async fn questions(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let page_size = state.config.page_size;
    let mut rows = match params.to_query(page_size) {
        Some(query) => state.backend.list_questions(&query).await?,
        None => Vec::new(),
    };
    let has_next = rows.len() > page_size;
    rows.truncate(page_size);

    Ok(Json(QuestionsResponse {
        page: params.page(),
        has_next,
        questions: rows,
    }))
}

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": VERSION,
        "backend": state.backend.name(),
        "live_subscribers": state.hub.subscriber_count(),
    }))
}
