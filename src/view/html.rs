// HTML adapter - view structs in, markup out
//
// Pages and fragments are tera templates compiled into the binary. Every
// interpolated value is escaped for quoted attributes; only markdown
// output and nested fragments are marked `safe`.

use super::{
    question_comment_href, user_href, CommentView, ComposerView, DetailView, FeedView, Pager,
    ProfileView, QuestionCard, TagRow, UserRow,
};
use crate::auth::HeaderView;
use crate::theme::Theme;
use std::sync::LazyLock;
use tera::{Context, Tera};

pub const FEED_CONTAINER: &str = "question-feed";
pub const COMMENTS_CONTAINER: &str = "comments";

const SORTS: [&str; 4] = ["newest", "votes", "views", "unanswered"];

/// Shown in place of a fragment whose template failed to render
const RENDER_FAILED: &str =
    "<p class=\"error\" role=\"alert\">This part of the page could not be displayed.</p>";

const TEMPLATE_SOURCES: [(&str, &str); 17] = [
    ("page.html", include_str!("../../templates/page.html")),
    ("header.html", include_str!("../../templates/header.html")),
    ("error_line.html", include_str!("../../templates/error_line.html")),
    ("muted.html", include_str!("../../templates/muted.html")),
    ("card.html", include_str!("../../templates/card.html")),
    ("question_list.html", include_str!("../../templates/question_list.html")),
    ("pager.html", include_str!("../../templates/pager.html")),
    ("feed.html", include_str!("../../templates/feed.html")),
    ("featured.html", include_str!("../../templates/featured.html")),
    ("search_form.html", include_str!("../../templates/search_form.html")),
    ("tags.html", include_str!("../../templates/tags.html")),
    ("users.html", include_str!("../../templates/users.html")),
    ("profile.html", include_str!("../../templates/profile.html")),
    ("comments.html", include_str!("../../templates/comments.html")),
    ("detail.html", include_str!("../../templates/detail.html")),
    ("suggestions.html", include_str!("../../templates/suggestions.html")),
    ("ask.html", include_str!("../../templates/ask.html")),
];

static TEMPLATES: LazyLock<Tera> = LazyLock::new(|| {
    let mut tera = Tera::default();
    if let Err(e) = tera.add_raw_templates(TEMPLATE_SOURCES) {
        tracing::error!("Failed to load page templates: {:?}", e);
    }
    tera.set_escape_fn(escape);
    tera
});

/// Quotes are escaped too, so values are safe inside attributes
fn escape(input: &str) -> String {
    html_escape::encode_quoted_attribute(input).into_owned()
}

fn render(name: &str, context: &Context) -> String {
    match TEMPLATES.render(name, context) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(template = name, "Failed to render template: {:?}", e);
            RENDER_FAILED.to_string()
        }
    }
}

/// Everything the page chrome needs
pub struct Shell<'a> {
    pub site_name: &'a str,
    pub title: &'a str,
    pub theme: Theme,
    pub header: &'a HeaderView,
    /// Where the sign-in control points; hidden when unset
    pub sign_in_url: Option<&'a str>,
}

pub fn page(shell: &Shell<'_>, content: &str) -> String {
    let mut context = Context::new();
    context.insert("site_name", shell.site_name);
    context.insert("title", shell.title);
    context.insert("theme", shell.theme.as_str());
    context.insert("header", &header(shell));
    context.insert("content", content);
    render("page.html", &context)
}

pub fn header(shell: &Shell<'_>) -> String {
    let view = shell.header;
    let mut context = Context::new();
    context.insert("site_name", shell.site_name);
    context.insert("header", view);
    context.insert(
        "profile_href",
        &view.profile_username.as_deref().map(user_href),
    );
    context.insert("sign_in_url", &shell.sign_in_url);
    context.insert("toggle_label", shell.theme.toggle_label());
    render("header.html", &context)
}

pub fn error_line(message: &str) -> String {
    let mut context = Context::new();
    context.insert("message", message);
    render("error_line.html", &context)
}

/// A single muted line, e.g. "User not found"
pub fn not_found(message: &str) -> String {
    let mut context = Context::new();
    context.insert("message", message);
    render("muted.html", &context)
}

fn list_context(cards: &[QuestionCard], empty_message: &str) -> Context {
    let mut context = Context::new();
    context.insert("cards", cards);
    context.insert("empty_message", empty_message);
    context
}

/// Cards for one container; replaces the container contents wholesale
pub fn question_list(cards: &[QuestionCard], empty_message: &str) -> String {
    render("question_list.html", &list_context(cards, empty_message))
}

/// Home feed: controls, the live container, paging
pub fn feed_page(view: &FeedView, live_href: Option<&str>) -> String {
    let mut context = list_context(&view.cards, view.empty_message());
    context.insert("heading", &view.heading);
    context.insert("message", &None::<String>);
    context.insert("search", &view.search);
    context.insert("tag", &view.tag);
    context.insert("sort", view.sort);
    context.insert("sorts", &SORTS);
    context.insert("container", FEED_CONTAINER);
    context.insert("live_href", &live_href);
    context.insert("pager", &view.pager);
    render("feed.html", &context)
}

/// Home page when the feed itself could not be loaded
pub fn feed_unavailable(message: &str) -> String {
    let mut context = Context::new();
    context.insert("heading", "All questions");
    context.insert("message", message);
    render("feed.html", &context)
}

/// Featured fragment fetched separately by the home page
pub fn featured(cards: &[QuestionCard]) -> String {
    let mut context = Context::new();
    context.insert("cards", cards);
    render("featured.html", &context)
}

fn index_context<T: serde::Serialize>(
    rows: &Result<Vec<T>, String>,
    action: &str,
    search: &str,
    placeholder: &str,
) -> Context {
    let mut context = Context::new();
    context.insert("action", action);
    context.insert("search", search);
    context.insert("placeholder", placeholder);
    match rows {
        Ok(rows) => {
            context.insert("rows", rows);
            context.insert("message", &None::<String>);
        }
        Err(message) => {
            context.insert("rows", &Vec::<T>::new());
            context.insert("message", message);
        }
    }
    context
}

pub fn tags_page(rows: &Result<Vec<TagRow>, String>, search: &str) -> String {
    render("tags.html", &index_context(rows, "/tags", search, "Filter tags"))
}

pub fn users_page(rows: &Result<Vec<UserRow>, String>, search: &str, pager_view: &Pager) -> String {
    let mut context = index_context(rows, "/users", search, "Search users");
    context.insert("pager", pager_view);
    render("users.html", &context)
}

pub fn profile_page(view: &ProfileView) -> String {
    let (cards, message) = match &view.questions {
        Ok(cards) => (cards.as_slice(), None),
        Err(message) => (&[][..], Some(message)),
    };
    let mut context = list_context(cards, "No questions asked yet.");
    context.insert("message", &message);
    context.insert("user", &view.user);
    context.insert("bio", &view.bio);
    context.insert("form", &view.edit_form);
    render("profile.html", &context)
}

fn comments_context(section: &Result<Vec<CommentView>, String>) -> Context {
    let mut context = Context::new();
    match section {
        Ok(list) => {
            context.insert("comments", list);
            context.insert("message", &None::<String>);
        }
        Err(message) => {
            context.insert("comments", &Vec::<CommentView>::new());
            context.insert("message", message);
        }
    }
    context
}

/// Comment list container contents
pub fn comments(section: &Result<Vec<CommentView>, String>) -> String {
    render("comments.html", &comments_context(section))
}

pub fn detail_page(view: &DetailView) -> String {
    let mut context = comments_context(&view.comments);
    context.insert("card", &view.card);
    context.insert("body_html", &view.body_html);
    context.insert(
        "answer_count",
        &view.comments.as_ref().map(Vec::len).unwrap_or(0),
    );
    context.insert("container", COMMENTS_CONTAINER);
    context.insert("form", &view.form);
    context.insert("comment_action", &question_comment_href(&view.id));
    render("detail.html", &context)
}

fn composer_context(view: &ComposerView) -> Context {
    match Context::from_serialize(view) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("Failed to build composer context: {:?}", e);
            Context::new()
        }
    }
}

/// Tag chips for the selected category
pub fn suggestions(view: &ComposerView) -> String {
    render("suggestions.html", &composer_context(view))
}

pub fn ask_page(view: &ComposerView) -> String {
    render("ask.html", &composer_context(view))
}
