//! HTML page handlers
//!
//! Each handler snapshots the client's controllers, does its backend work,
//! applies its own change through `ClientRegistry::update` and renders a
//! full page. Section-level
//! backend failures degrade to an inline message; mutations that fail
//! re-render their form with an error status.

use super::client::CookieState;
use super::error::PageError;
use super::live::feed_href;
use super::AppState;
use crate::auth::{self as session, AuthController, SESSION_SIGNATURE_HEADER};
use crate::backend::BackendError;
use crate::composer::draft::Draft;
use crate::composer::{Notice, QuestionComposer, SubmitOutcome, ToggleOutcome};
use crate::detail::{self, CommentOutcome, DetailPage};
use crate::listing::{
    self, FeaturedCache, FeaturedOutcome, FeedParams, ProfilePage, SearchParams,
};
use crate::live::FeedEvent;
use crate::model::{Identity, ProfileUpdate, QuestionId};
use crate::store::ClientId;
use crate::theme::{self, Theme};
use crate::view::html::{self, Shell};
use crate::view::{composer_view, question_href, user_href, CommentForm, ComposerView, ProfileForm, LOAD_FAILED};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use serde::Deserialize;

const QUESTION_NOT_FOUND: &str = "Question not found";
const USER_NOT_FOUND: &str = "User not found";
const ASK_SIGN_IN: &str = "Sign in to ask a question";
const PROFILE_SIGN_IN: &str = "Sign in to edit your profile";
const ID_CONFLICT: &str = "Another question took this ID at the same moment. Please submit again.";
const SUBMIT_FAILED: &str = "Could not post your question. Please try again.";
const USERNAME_RULE: &str = "Usernames are 3 to 20 lowercase letters, digits or underscores";
const USERNAME_TAKEN: &str = "That username is already taken";
const PROFILE_FAILED: &str = "Could not save your profile. Please try again.";
const SESSION_REJECTED: &str = "Session notification rejected";

// ─────────────────────────────────────────────────────────────────────────────
// Request parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct UserParams {
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct QuestionParams {
    id: Option<String>,
}

impl QuestionParams {
    fn question_id(&self) -> Option<QuestionId> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| QuestionId(s.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentFormData {
    body: String,
}

/// Fields of the ask form; every composer route posts the whole form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AskForm {
    title: String,
    body: String,
    category: String,
    tag: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ProfileFormData {
    username: String,
    display_name: String,
    avatar_url: String,
    bio: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn theme_for(state: &AppState, client: &ClientId) -> Theme {
    let client = client.clone();
    state
        .with_store(move |store| Ok(theme::load(store, &client)))
        .await
        .unwrap_or_default()
}

async fn render(
    state: &AppState,
    client: &ClientId,
    auth: &AuthController,
    title: &str,
    content: &str,
) -> Html<String> {
    let theme = theme_for(state, client).await;
    let header = auth.header_view();
    let shell = Shell {
        site_name: &state.config.site_name,
        title,
        theme,
        header: &header,
        sign_in_url: state.config.auth.sign_in_url.as_deref(),
    };
    Html(html::page(&shell, content))
}

async fn message_page(
    state: &AppState,
    client: &ClientId,
    auth: &AuthController,
    status: StatusCode,
    message: &str,
) -> Response {
    let page = render(state, client, auth, message, &html::not_found(message)).await;
    (status, page).into_response()
}

async fn ask_response(
    state: &AppState,
    client: &ClientId,
    auth: &AuthController,
    status: StatusCode,
    view: &ComposerView,
) -> Response {
    let page = render(state, client, auth, "Ask a question", &html::ask_page(view)).await;
    (status, page).into_response()
}

/// Local path of the Referer, so redirects never leave this site
fn local_path(referer: &str) -> Option<String> {
    let path = match referer.split_once("://") {
        Some((_, rest)) => &rest[rest.find('/')?..],
        None => referer,
    };
    (path.starts_with('/') && !path.starts_with("//")).then(|| path.to_string())
}

fn back_to(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(local_path)
        .unwrap_or_else(|| "/".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Listings
// ─────────────────────────────────────────────────────────────────────────────

pub(super) async fn home(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<FeedParams>,
) -> Html<String> {
    let controllers = state.registry.snapshot(&client);
    let feed = listing::home_feed(
        state.backend.as_ref(),
        &params,
        state.config.page_size,
        Utc::now(),
    )
    .await;

    let content = match feed {
        Ok(view) => {
            let live = state
                .config
                .features
                .live_updates
                .then(|| feed_href(&params));
            html::feed_page(&view, live.as_deref())
        }
        Err(message) => html::feed_unavailable(&message),
    };
    render(&state, &client, &controllers.auth, "", &content).await
}

pub(super) async fn tags(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<SearchParams>,
) -> Html<String> {
    let controllers = state.registry.snapshot(&client);
    let rows = listing::tag_index(state.backend.as_ref(), &params).await;
    let content = html::tags_page(&rows, params.search());
    render(&state, &client, &controllers.auth, "Tags", &content).await
}

pub(super) async fn users(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<SearchParams>,
) -> Html<String> {
    let controllers = state.registry.snapshot(&client);
    let (rows, pager) = listing::user_index(
        state.backend.as_ref(),
        &params,
        state.config.page_size,
        Utc::now(),
    )
    .await;
    let content = html::users_page(&rows, params.search(), &pager);
    render(&state, &client, &controllers.auth, "Users", &content).await
}

pub(super) async fn user(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<UserParams>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    let auth = &controllers.auth;
    let username = params.username.unwrap_or_default();
    if username.trim().is_empty() {
        return message_page(&state, &client, auth, StatusCode::NOT_FOUND, USER_NOT_FOUND).await;
    }

    let page = listing::profile_page(
        state.backend.as_ref(),
        &username,
        auth.user_id(),
        state.config.page_size,
        Utc::now(),
    )
    .await;

    match page {
        ProfilePage::Found(view) => {
            let content = html::profile_page(&view);
            render(&state, &client, auth, &view.user.display_name, &content)
                .await
                .into_response()
        }
        ProfilePage::NotFound => {
            message_page(&state, &client, auth, StatusCode::NOT_FOUND, USER_NOT_FOUND).await
        }
        ProfilePage::Failed(message) => render(&state, &client, auth, "", &html::error_line(&message))
            .await
            .into_response(),
    }
}

/// Featured fragment; 304 when the client already holds this exact HTML
///
/// Requests without a client cookie skip the per-client cache so one-off
/// visitors never write to the store.
pub(super) async fn featured(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Extension(cookie): Extension<CookieState>,
    headers: HeaderMap,
) -> Response {
    let cards = match listing::featured_cards(
        state.backend.as_ref(),
        state.config.featured_limit,
        Utc::now(),
    )
    .await
    {
        Ok(cards) => cards,
        Err(message) => {
            return (StatusCode::BAD_GATEWAY, Html(html::error_line(&message))).into_response()
        }
    };
    let fragment = html::featured(&cards);

    if !state.config.features.featured_cache || cookie == CookieState::Issued {
        let etag = listing::fragment_etag(&fragment);
        return fragment_response(StatusCode::OK, &etag, fragment);
    }

    let presented = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let fresh = fragment.clone();
    let owner = client.clone();
    let outcome = state
        .with_store(move |store| FeaturedCache::new(store).refresh(&owner, fresh))
        .await;

    match outcome {
        Ok(FeaturedOutcome::Unchanged { etag }) if presented.as_deref() == Some(etag.as_str()) => {
            fragment_response(StatusCode::NOT_MODIFIED, &etag, String::new())
        }
        // Unchanged, but the client no longer has its copy
        Ok(FeaturedOutcome::Unchanged { etag }) => fragment_response(StatusCode::OK, &etag, fragment),
        Ok(FeaturedOutcome::Changed { html, etag }) => fragment_response(StatusCode::OK, &etag, html),
        Err(e) => {
            tracing::warn!(client = %client, "Featured cache unavailable: {}", e);
            let etag = listing::fragment_etag(&fragment);
            fragment_response(StatusCode::OK, &etag, fragment)
        }
    }
}

fn fragment_response(status: StatusCode, etag: &str, body: String) -> Response {
    let mut response = (status, Html(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Question detail
// ─────────────────────────────────────────────────────────────────────────────

async fn detail_response(
    state: &AppState,
    client: &ClientId,
    auth: &AuthController,
    page: DetailPage,
    status: StatusCode,
    form: Option<CommentForm>,
) -> Response {
    match page {
        DetailPage::Found(mut view) => {
            if let Some(form) = form {
                view.form = form;
            }
            let content = html::detail_page(&view);
            let page = render(state, client, auth, &view.card.title, &content).await;
            (status, page).into_response()
        }
        DetailPage::NotFound => {
            message_page(state, client, auth, StatusCode::NOT_FOUND, QUESTION_NOT_FOUND).await
        }
        DetailPage::Failed => render(state, client, auth, "", &html::error_line(LOAD_FAILED))
            .await
            .into_response(),
    }
}

pub(super) async fn question(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<QuestionParams>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    let auth = &controllers.auth;
    let Some(id) = params.question_id() else {
        return message_page(&state, &client, auth, StatusCode::NOT_FOUND, QUESTION_NOT_FOUND).await;
    };

    let page = detail::load(state.backend.as_ref(), &id, auth, true, Utc::now()).await;
    detail_response(&state, &client, auth, page, StatusCode::OK, None).await
}

pub(super) async fn comment(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Query(params): Query<QuestionParams>,
    Form(form): Form<CommentFormData>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    let auth = &controllers.auth;
    let Some(id) = params.question_id() else {
        return message_page(&state, &client, auth, StatusCode::NOT_FOUND, QUESTION_NOT_FOUND).await;
    };

    let outcome = detail::post_comment(state.backend.as_ref(), auth, &id, &form.body).await;
    let status = match &outcome {
        CommentOutcome::Posted => {
            state.hub.publish(FeedEvent::CommentAdded(id.clone()));
            StatusCode::OK
        }
        CommentOutcome::NotSignedIn => StatusCode::UNAUTHORIZED,
        CommentOutcome::Empty => StatusCode::UNPROCESSABLE_ENTITY,
        CommentOutcome::Failed(BackendError::NotFound) => StatusCode::NOT_FOUND,
        CommentOutcome::Failed(_) => StatusCode::BAD_GATEWAY,
    };
    let comment_form = CommentForm {
        signed_in: auth.user_id().is_some(),
        body: match &outcome {
            CommentOutcome::Posted => String::new(),
            _ => form.body,
        },
        notice: outcome.notice().map(str::to_string),
    };

    // Refetch everything, comments included
    let page = detail::load(state.backend.as_ref(), &id, auth, false, Utc::now()).await;
    detail_response(&state, &client, auth, page, status, Some(comment_form)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Ask a question
// ─────────────────────────────────────────────────────────────────────────────

/// Apply the form's category when it differs from the composer's
fn sync_category(composer: &mut QuestionComposer, category: &str) -> Option<String> {
    let category = category.trim();
    if category.is_empty() || composer.category() == Some(category) {
        return None;
    }
    composer.select_category(category).err().map(|n| n.to_string())
}

pub(super) async fn ask(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    if controllers.auth.user_id().is_none() {
        return message_page(&state, &client, &controllers.auth, StatusCode::UNAUTHORIZED, ASK_SIGN_IN)
            .await;
    }

    let now = Utc::now();
    let ttl = state.config.composer.draft_ttl();
    let owner = client.clone();
    let draft = match state
        .with_store(move |store| Draft::restore(store, &owner, now, ttl))
        .await
    {
        Ok(draft) => draft,
        Err(e) => {
            tracing::warn!(client = %client, "Could not restore draft: {}", e);
            None
        }
    };

    let view = match draft {
        Some(draft) => {
            let composer = state.registry.update(&client, |c| {
                draft.apply_to(&mut c.composer);
                c.composer.clone()
            });
            let mut view = composer_view(&composer, &draft.title, &draft.body);
            view.draft_restored = true;
            view
        }
        None => composer_view(&controllers.composer, "", ""),
    };
    ask_response(&state, &client, &controllers.auth, StatusCode::OK, &view).await
}

pub(super) async fn ask_category(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Form(form): Form<AskForm>,
) -> Response {
    let (notice, controllers) = state.registry.update(&client, |c| {
        let notice = if form.category.trim().is_empty() {
            Some(Notice::NoCategory.to_string())
        } else {
            c.composer
                .select_category(&form.category)
                .err()
                .map(|n| n.to_string())
        };
        (notice, c.clone())
    });

    let mut view = composer_view(&controllers.composer, &form.title, &form.body);
    view.notice = notice;
    ask_response(&state, &client, &controllers.auth, StatusCode::OK, &view).await
}

pub(super) async fn ask_tag(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Form(form): Form<AskForm>,
) -> Response {
    let (notice, controllers) = state.registry.update(&client, |c| {
        let mut notice = sync_category(&mut c.composer, &form.category);
        if notice.is_none() {
            if let ToggleOutcome::Rejected(rejected) = c.composer.toggle_tag(&form.tag) {
                notice = Some(rejected.to_string());
            }
        }
        (notice, c.clone())
    });

    let mut view = composer_view(&controllers.composer, &form.title, &form.body);
    view.notice = notice;
    ask_response(&state, &client, &controllers.auth, StatusCode::OK, &view).await
}

/// Autosave from the ask page
pub(super) async fn ask_draft(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Form(form): Form<AskForm>,
) -> Result<StatusCode, PageError> {
    let draft = state.registry.update(&client, |c| {
        sync_category(&mut c.composer, &form.category);
        Draft::capture(&c.composer, &form.title, &form.body, Utc::now())
    });

    let owner = client.clone();
    state
        .with_store(move |store| draft.save(store, &owner))
        .await?;
    tracing::debug!(client = %client, "Draft saved");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn ask_submit(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Form(form): Form<AskForm>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    let Some(author) = controllers.auth.user_id().cloned() else {
        return message_page(&state, &client, &controllers.auth, StatusCode::UNAUTHORIZED, ASK_SIGN_IN)
            .await;
    };

    let (notice, composer) = state.registry.update(&client, |c| {
        (sync_category(&mut c.composer, &form.category), c.composer.clone())
    });

    let outcome = composer
        .submit(state.backend.as_ref(), &form.title, &form.body, &author)
        .await;

    let (status, error) = match outcome {
        SubmitOutcome::Created(question) => {
            let owner = client.clone();
            if let Err(e) = state.with_store(move |store| Draft::clear(store, &owner)).await {
                tracing::warn!(client = %client, "Could not clear draft: {}", e);
            }
            state.registry.update(&client, |c| c.composer.reset());
            state.hub.publish(FeedEvent::QuestionCreated(question.id.clone()));
            return Redirect::to(&question_href(&question.id)).into_response();
        }
        SubmitOutcome::Invalid(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        SubmitOutcome::IdConflict => (StatusCode::CONFLICT, ID_CONFLICT.to_string()),
        SubmitOutcome::Failed(_) => (StatusCode::BAD_GATEWAY, SUBMIT_FAILED.to_string()),
    };

    // Whatever arrived while the insert was in flight, a sign-out included
    let current = state.registry.snapshot(&client);
    let mut view = composer_view(&composer, &form.title, &form.body);
    view.notice = notice;
    view.error = Some(error);
    ask_response(&state, &client, &current.auth, status, &view).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile, session, theme
// ─────────────────────────────────────────────────────────────────────────────

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// Re-render the signed-in user's profile with the submitted form and an error
async fn profile_form_error(
    state: &AppState,
    client: &ClientId,
    auth: &AuthController,
    submitted: &ProfileFormData,
    status: StatusCode,
    message: &str,
) -> Response {
    let username = match (auth.profile(), auth.user_id()) {
        (Some(profile), _) => Some(profile.username.clone()),
        (None, Some(id)) => state.backend.get_profile(id).await.ok().map(|p| p.username),
        (None, None) => None,
    };
    let page = match username {
        Some(username) => {
            listing::profile_page(
                state.backend.as_ref(),
                &username,
                auth.user_id(),
                state.config.page_size,
                Utc::now(),
            )
            .await
        }
        None => ProfilePage::NotFound,
    };

    let content = match page {
        ProfilePage::Found(mut view) => {
            view.edit_form = Some(ProfileForm {
                username: submitted.username.clone(),
                display_name: submitted.display_name.clone(),
                avatar_url: submitted.avatar_url.clone(),
                bio: submitted.bio.clone(),
                error: Some(message.to_string()),
            });
            html::profile_page(&view)
        }
        _ => html::error_line(message),
    };
    let page = render(state, client, auth, "Edit profile", &content).await;
    (status, page).into_response()
}

pub(super) async fn profile_edit(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Form(form): Form<ProfileFormData>,
) -> Response {
    let controllers = state.registry.snapshot(&client);
    let Some(user_id) = controllers.auth.user_id().cloned() else {
        return message_page(&state, &client, &controllers.auth, StatusCode::UNAUTHORIZED, PROFILE_SIGN_IN)
            .await;
    };

    let username = form.username.trim().to_string();
    if !state.username_pattern.is_match(&username) {
        return profile_form_error(
            &state,
            &client,
            &controllers.auth,
            &form,
            StatusCode::UNPROCESSABLE_ENTITY,
            USERNAME_RULE,
        )
        .await;
    }

    let update = ProfileUpdate {
        display_name: non_empty(&form.display_name).unwrap_or_else(|| username.clone()),
        username,
        avatar_url: non_empty(&form.avatar_url),
        bio: non_empty(&form.bio),
    };

    match state.backend.update_profile(&user_id, &update).await {
        Ok(profile) => {
            tracing::info!(user = %user_id, username = %profile.username, "Profile updated");
            let href = user_href(&profile.username);
            // Only if the same user is still signed in
            state.registry.update(&client, |c| {
                if c.auth.user_id() == Some(&user_id) {
                    c.auth.set_profile(profile);
                }
            });
            Redirect::to(&href).into_response()
        }
        Err(BackendError::Conflict(_)) => {
            profile_form_error(&state, &client, &controllers.auth, &form, StatusCode::CONFLICT, USERNAME_TAKEN)
                .await
        }
        Err(e) => {
            tracing::error!(user = %user_id, "Failed to update profile: {}", e);
            profile_form_error(&state, &client, &controllers.auth, &form, StatusCode::BAD_GATEWAY, PROFILE_FAILED)
                .await
        }
    }
}

/// Whether a session notification body carries a valid signature
fn session_trusted(state: &AppState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(secret) = state.config.auth.session_secret.as_deref() else {
        return false;
    };
    headers
        .get(SESSION_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|signature| session::verify_session(secret, body, signature))
}

/// Session-change notification from the auth service; answers with the new header
pub(super) async fn auth_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !session_trusted(&state, &headers, &body) {
        tracing::warn!(client = %client, "Rejected unsigned session notification");
        return (StatusCode::UNAUTHORIZED, SESSION_REJECTED).into_response();
    }
    let identity: Identity = match serde_json::from_slice(&body) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(client = %client, "Malformed session notification: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let mut auth = state.registry.snapshot(&client).auth;
    auth.on_session_change(state.backend.as_ref(), Some(identity)).await;
    let header_view = auth.header_view();
    state.registry.update(&client, |c| c.auth = auth);

    let theme = theme_for(&state, &client).await;
    let shell = Shell {
        site_name: &state.config.site_name,
        title: "",
        theme,
        header: &header_view,
        sign_in_url: state.config.auth.sign_in_url.as_deref(),
    };
    Html(html::header(&shell)).into_response()
}

pub(super) async fn auth_signout(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Redirect {
    let mut auth = state.registry.snapshot(&client).auth;
    auth.on_session_change(state.backend.as_ref(), None).await;
    state.registry.update(&client, |c| c.auth = auth);
    Redirect::to("/")
}

pub(super) async fn theme_toggle(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    headers: HeaderMap,
) -> Result<Redirect, PageError> {
    let owner = client.clone();
    let theme = state
        .with_store(move |store| theme::toggle(store, &owner))
        .await?;
    tracing::debug!(client = %client, theme = theme.as_str(), "Theme toggled");
    Ok(Redirect::to(&back_to(&headers)))
}
