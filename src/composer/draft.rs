// Composer draft autosave
//
// The ask page posts the form periodically; the latest snapshot is kept in
// the client store under `question_draft`. A draft older than the TTL is
// deleted instead of restored.

use super::QuestionComposer;
use crate::store::{ClientId, ClientStore, StoreError, DRAFT_KEY};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    /// Snapshot the form fields plus the composer's category and tags
    pub fn capture(composer: &QuestionComposer, title: &str, body: &str, now: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            category: composer.category().map(str::to_string),
            tags: composer.selected().iter().map(|t| t.to_string()).collect(),
            saved_at: now,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.saved_at < ttl
    }

    /// Re-apply category and tags; tags no longer in the catalog are dropped
    pub fn apply_to(&self, composer: &mut QuestionComposer) {
        composer.reset();
        let Some(category) = &self.category else {
            return;
        };
        if composer.select_category(category).is_err() {
            tracing::debug!(category = %category, "Draft category no longer exists");
            return;
        }
        for tag in &self.tags {
            composer.toggle_tag(tag);
        }
    }

    pub fn save(&self, store: &ClientStore, client: &ClientId) -> Result<(), StoreError> {
        store.set_json(client, DRAFT_KEY, self)
    }

    /// Load the stored draft if it is still fresh; stale or unreadable
    /// drafts are deleted
    pub fn restore(
        store: &ClientStore,
        client: &ClientId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Draft>, StoreError> {
        let draft = match store.get_json::<Draft>(client, DRAFT_KEY) {
            Ok(Some(draft)) => draft,
            Ok(None) => return Ok(None),
            Err(StoreError::Encoding(e)) => {
                tracing::warn!(client = %client, "Discarding unreadable draft: {}", e);
                store.remove(client, DRAFT_KEY)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if draft.is_fresh(now, ttl) {
            Ok(Some(draft))
        } else {
            store.remove(client, DRAFT_KEY)?;
            Ok(None)
        }
    }

    pub fn clear(store: &ClientStore, client: &ClientId) -> Result<(), StoreError> {
        store.remove(client, DRAFT_KEY)
    }
}
