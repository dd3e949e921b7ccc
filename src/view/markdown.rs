// Markdown → HTML for question and comment bodies
//
// Raw HTML in the source is never passed through: block and inline HTML
// events are re-emitted as text, so the writer escapes them. Link and
// image destinations keep only http, https, mailto and relative targets;
// anything else (javascript:, data:, vbscript:) becomes "#".

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];
const BLOCKED_DESTINATION: &str = "#";

/// Scheme of a destination, if it has one before any path, query or fragment
fn scheme(dest: &str) -> Option<String> {
    // Browsers ignore whitespace and control characters inside a scheme
    let compact: String = dest
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let end = compact.find(|c: char| matches!(c, ':' | '/' | '?' | '#'))?;
    compact[end..]
        .starts_with(':')
        .then(|| compact[..end].to_ascii_lowercase())
}

fn is_safe_destination(dest: &str) -> bool {
    match scheme(dest) {
        None => true,
        Some(scheme) => ALLOWED_SCHEMES.contains(&scheme.as_str()),
    }
}

fn sanitize_destination(dest: CowStr<'_>) -> CowStr<'_> {
    if is_safe_destination(&dest) {
        dest
    } else {
        tracing::debug!(destination = %dest, "Dropped unsafe link destination");
        CowStr::Borrowed(BLOCKED_DESTINATION)
    }
}

pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: sanitize_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: sanitize_destination(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let html = render_markdown("**F = ma** and `v = u + at`");
        assert!(html.contains("<strong>F = ma</strong>"));
        assert!(html.contains("<code>v = u + at</code>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let block = render_markdown("<div onclick=\"x()\">hi</div>\n");
        assert!(!block.contains("<div"));
    }

    #[test]
    fn test_bengali_text_passes_through() {
        let html = render_markdown("নিউটনের *দ্বিতীয়* সূত্র");
        assert!(html.contains("<em>দ্বিতীয়</em>"));
    }

    #[test]
    fn test_script_links_are_neutralised() {
        let html = render_markdown("[click me](javascript:alert(document.domain))");
        assert_eq!(html, "<p><a href=\"#\">click me</a></p>\n");

        for source in [
            "[x](JavaScript:alert(1))",
            "[x](<java\tscript:alert(1)>)",
            "[x](&#106;avascript:alert(1))",
            "<javascript:alert(1)>",
            "![img](data:text/html;base64,PHNjcmlwdD4=)",
            "[x](vbscript:msgbox(1))",
        ] {
            let html = render_markdown(source);
            for value in attribute_values(&html) {
                assert_eq!(value, "#", "{source} -> {html}");
            }
        }
    }

    /// Values of every href and src attribute in `html`
    fn attribute_values(html: &str) -> Vec<&str> {
        ["href=\"", "src=\""]
            .iter()
            .flat_map(|attr| html.match_indices(attr).map(move |(i, _)| i + attr.len()))
            .filter_map(|start| html[start..].split('"').next())
            .collect()
    }

    #[test]
    fn test_safe_links_are_kept() {
        let html = render_markdown(
            "[wiki](https://en.wikipedia.org/wiki/Force) [local](/question?id=aZ3kP9qR) \
             [mail](mailto:a@b.c) [anchor](#answers) [rel](notes/a:b)",
        );
        assert!(html.contains("href=\"https://en.wikipedia.org/wiki/Force\""));
        assert!(html.contains("href=\"/question?id=aZ3kP9qR\""));
        assert!(html.contains("href=\"mailto:a@b.c\""));
        assert!(html.contains("href=\"#answers\""));
        assert!(html.contains("href=\"notes/a:b\""));

        let img = render_markdown("![diagram](https://img.example.com/f.png)");
        assert!(img.contains("src=\"https://img.example.com/f.png\""));
    }
}
