//! HTTP-facing errors

use crate::store::StoreError;
use crate::view::{html, LOAD_FAILED};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Failures that abort a whole request
///
/// Backend failures never get here: listings degrade to an inline message
/// and forms re-render with their own status.
#[derive(Debug)]
pub(crate) enum PageError {
    /// Client store read/write failed
    Store(StoreError),
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        PageError::Store(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            PageError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        tracing::error!("Request failed: {} - {}", status, message);

        // Details stay in the log
        (status, Html(html::error_line(LOAD_FAILED))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_is_500() {
        let response = PageError::Store(StoreError::Database("locked".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
