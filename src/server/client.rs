//! Per-client identity and controller state
//!
//! Every browser gets a `qa_client` cookie on its first request. The id
//! keys both the persisted client store and the in-memory controllers
//! (auth state, composer selection, live subscription slot).
//!
//! Handlers read a snapshot, await whatever they need, then apply their
//! change through `update`, which touches only the fields that handler owns.
//! The registry lock is never held across an await. Entries idle for longer
//! than the sweep threshold are evicted unless a live feed is still open.

use crate::auth::AuthController;
use crate::composer::{QuestionComposer, Rules};
use crate::live::{Release, SubscriptionSlot};
use crate::store::ClientId;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use cookie::{time, Cookie, SameSite};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const CLIENT_COOKIE: &str = "qa_client";

const COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Whether the request arrived with a valid client cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieState {
    Presented,
    /// A new id was minted for this request; nothing is stored for it yet
    Issued,
}

/// Find our client id in the request's Cookie headers
pub fn client_from_headers(headers: &HeaderMap) -> Option<ClientId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == CLIENT_COOKIE)
        .and_then(|cookie| ClientId::parse(cookie.value().trim()))
}

fn set_cookie_value(client: &ClientId) -> Option<HeaderValue> {
    let cookie = Cookie::build((CLIENT_COOKIE, client.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// Middleware: attach `ClientId` and `CookieState`, issuing a cookie when missing
pub async fn client_cookie(mut req: Request, next: Next) -> Response {
    let existing = client_from_headers(req.headers());
    let state = if existing.is_some() {
        CookieState::Presented
    } else {
        CookieState::Issued
    };
    let client = existing.unwrap_or_else(ClientId::generate);
    req.extensions_mut().insert(client.clone());
    req.extensions_mut().insert(state);

    let mut response = next.run(req).await;
    if state == CookieState::Issued {
        tracing::debug!(client = %client, "Issued client cookie");
        if let Some(value) = set_cookie_value(&client) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Controller state for one client
#[derive(Debug, Clone)]
pub struct ClientControllers {
    pub auth: AuthController,
    pub composer: QuestionComposer,
}

struct Entry {
    controllers: ClientControllers,
    feed_slot: SubscriptionSlot,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct ClientRegistry {
    rules: Rules,
    entries: Arc<Mutex<HashMap<ClientId, Entry>>>,
}

impl ClientRegistry {
    pub fn new(rules: Rules) -> Self {
        Self {
            rules,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, Entry>> {
        // A panic elsewhere doesn't invalidate the map itself
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh_controllers(&self) -> ClientControllers {
        ClientControllers {
            auth: AuthController::default(),
            composer: QuestionComposer::new(self.rules),
        }
    }

    fn fresh_entry(&self) -> Entry {
        Entry {
            controllers: self.fresh_controllers(),
            feed_slot: SubscriptionSlot::default(),
            last_seen: Instant::now(),
        }
    }

    /// Copy of the client's controllers (defaults for an unknown client)
    ///
    /// Reading never creates an entry, so cookieless crawlers leave no trace.
    pub fn snapshot(&self, client: &ClientId) -> ClientControllers {
        match self.lock().get_mut(client) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                entry.controllers.clone()
            }
            None => self.fresh_controllers(),
        }
    }

    /// Apply `f` to the client's current controllers under the lock
    ///
    /// Call this after any await, with a closure that only changes the
    /// fields the handler is responsible for.
    pub fn update<R>(&self, client: &ClientId, f: impl FnOnce(&mut ClientControllers) -> R) -> R {
        let mut entries = self.lock();
        let entry = entries
            .entry(client.clone())
            .or_insert_with(|| self.fresh_entry());
        entry.last_seen = Instant::now();
        f(&mut entry.controllers)
    }

    /// Start a live feed subscription, releasing the client's previous one
    pub fn establish_feed(&self, client: &ClientId) -> Release {
        let mut entries = self.lock();
        let entry = entries
            .entry(client.clone())
            .or_insert_with(|| self.fresh_entry());
        entry.last_seen = Instant::now();
        let release = entry.feed_slot.establish();
        tracing::debug!(
            client = %client,
            generation = entry.feed_slot.generation(),
            "Live feed subscription established"
        );
        release
    }

    pub fn feed_active(&self, client: &ClientId) -> bool {
        self.lock()
            .get(client)
            .is_some_and(|entry| entry.feed_slot.is_active())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Drop entries untouched for `idle` whose live feed (if any) has closed
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() < idle || entry.feed_slot.is_active());
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = entries.len(), "Evicted idle clients");
        }
        evicted
    }
}
