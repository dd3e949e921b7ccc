//! `GET /live/feed` - server-sent re-renders of the home feed container
//!
//! The stream ends when the same client opens another one (its slot is
//! released) or when the browser disconnects.

use super::AppState;
use crate::listing::{self, FeedParams};
use crate::store::ClientId;
use crate::util::query_string;
use crate::view::html;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension,
};
use chrono::Utc;
use futures::StreamExt;
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// SSE event name the page script listens for
pub const FEED_EVENT: &str = "feed";

/// Stream URL carrying the same filters as the page
pub(super) fn feed_href(params: &FeedParams) -> String {
    let page = params.page().to_string();
    let mut pairs = vec![("sort", params.sort().as_str()), ("page", page.as_str())];
    for (key, value) in [("q", &params.q), ("tag", &params.tag)] {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            pairs.push((key, value));
        }
    }
    format!("/live/feed?{}", query_string(&pairs))
}

async fn render_feed(state: &AppState, params: &FeedParams) -> String {
    let feed = listing::home_feed(
        state.backend.as_ref(),
        params,
        state.config.page_size,
        Utc::now(),
    )
    .await;
    let fragment = match feed {
        Ok(view) => html::question_list(&view.cards, view.empty_message()),
        Err(message) => html::error_line(&message),
    };
    // SSE fields can't carry carriage returns
    fragment.replace('\r', "")
}

pub(super) async fn feed(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<FeedParams>,
) -> Response {
    if !state.config.features.live_updates {
        return StatusCode::NOT_FOUND.into_response();
    }

    if state.registry.feed_active(&client) {
        tracing::debug!(client = %client, "Replacing open live feed");
    }
    let release = state.registry.establish_feed(&client);
    let events = BroadcastStream::new(state.hub.subscribe());

    let stream = events.take_until(release).then(move |item| {
        let state = state.clone();
        let params = params.clone();
        async move {
            match item {
                Ok(event) => tracing::debug!(?event, "Re-rendering live feed"),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Live feed lagged, re-rendering once")
                }
            }
            let fragment = render_feed(&state, &params).await;
            Ok::<_, Infallible>(Event::default().event(FEED_EVENT).data(fragment))
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_href_keeps_filters() {
        let params = FeedParams {
            page: Some(2),
            sort: Some("votes".into()),
            q: Some(" গতি ".into()),
            tag: None,
        };
        let href = feed_href(&params);
        assert_eq!(href, "/live/feed?sort=votes&page=2&q=%E0%A6%97%E0%A6%A4%E0%A6%BF");

        let params = FeedParams {
            tag: Some("a&b".into()),
            ..Default::default()
        };
        assert_eq!(feed_href(&params), "/live/feed?sort=newest&page=1&tag=a%26b");
    }
}
