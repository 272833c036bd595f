//! HTML helpers: anchor resolution and readable-text extraction.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose content is never visible text.
const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "svg", "head", "iframe"];

/// Elements rendered on their own line.
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tr", "ul",
];

/// Resolved `href` of every anchor in `html`, in document order.
///
/// Relative references are resolved against `<base href>` when present,
/// otherwise against `page_url`. Anchors without `href`, or whose target
/// cannot be resolved, are skipped.
pub fn anchor_urls(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url);

    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect()
}

/// Readable text of the page's main content region.
///
/// The first `<main>` element wins when it has any text; otherwise the whole
/// `<body>` is used. Returns an empty string when neither yields text.
pub fn policy_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in ["main", "body"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = inner_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Approximate the browser's `innerText`: visible text with block elements on
/// separate lines, whitespace collapsed within lines, and blank lines dropped.
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(element, &mut raw);
    normalize_lines(&raw)
}

/// Cut `text` to at most `max_chars` characters, ending on a word boundary.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(space) if space > 0 => format!("{}...", head[..space].trim_end()),
        _ => format!("{head}..."),
    }
}

fn base_url(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        // Source line breaks inside text are layout, not content.
        if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }
        let block = BLOCKS.contains(&name);
        if block {
            out.push('\n');
        } else if matches!(name, "td" | "th") {
            out.push(' ');
        }
        push_text(child, out);
        if block {
            out.push('\n');
        }
    }
}

fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
