use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::OnceLock;
use tracing::{info, warn};

pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Elements dropped together with their whole subtree. Raw-text elements
/// (`xmp`, `noembed`, `noframes`, `plaintext`) are here too: their text is not
/// entity-decoded on parse, so writing it back escaped would grow on every pass.
const STRIPPED_TAGS: [&str; 13] = [
    "script", "style", "meta", "link", "svg", "noscript", "template", "iframe", "footer",
    "xmp", "noembed", "noframes", "plaintext",
];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Sections preferred over blind truncation, highest priority first.
const PRIORITY_SECTIONS: [&str; 3] = ["form", "main", "article"];

/// A second pass only catches whitespace joined by removed nodes.
const MAX_SANITIZE_PASSES: usize = 4;

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Shrinks page markup before it is embedded in an oracle prompt.
pub struct DomProcessor {
    max_content_length: usize,
}

impl DomProcessor {
    pub fn new(max_content_length: usize) -> Self {
        Self { max_content_length }
    }

    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }

    /// Sanitize, then cap at the configured length.
    pub fn prune(&self, html: &str) -> String {
        let original = char_len(html);
        let cleaned = sanitize_html(html);
        let cleaned_len = char_len(&cleaned);
        let reduction = if original > 0 {
            (original.saturating_sub(cleaned_len)) as f64 * 100.0 / original as f64
        } else {
            0.0
        };
        info!(
            original,
            cleaned = cleaned_len,
            "sanitized page markup (reduced by {:.2}%)",
            reduction
        );
        cap_content(&cleaned, self.max_content_length)
    }
}

/// Strips markup that never helps choose an action: scripts, styles,
/// comments, meta/link tags, svg, `data-*` attributes, hidden elements and
/// footers. Whitespace runs collapse to a single space.
///
/// Idempotent: `sanitize_html(&sanitize_html(x)) == sanitize_html(x)`.
pub fn sanitize_html(html: &str) -> String {
    let mut current = sanitize_once(html);
    for _ in 1..MAX_SANITIZE_PASSES {
        let next = sanitize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn sanitize_once(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    write_element(document.root_element(), &mut out);
    whitespace().replace_all(&out, " ").trim().to_string()
}

fn is_hidden(el: &scraper::node::Element) -> bool {
    if el.attr("hidden").is_some() {
        return true;
    }
    if el.attr("aria-hidden").map(|v| v.eq_ignore_ascii_case("true")) == Some(true) {
        return true;
    }
    if el.name() == "input"
        && el.attr("type").map(|t| t.eq_ignore_ascii_case("hidden")) == Some(true)
    {
        return true;
    }
    el.attr("style")
        .map(|style| {
            let compact: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            compact.contains("display:none")
        })
        .unwrap_or(false)
}

fn write_element(el: ElementRef<'_>, out: &mut String) {
    let value = el.value();
    let name = value.name();
    if STRIPPED_TAGS.contains(&name) || is_hidden(value) {
        return;
    }

    out.push('<');
    out.push_str(name);
    // Attribute storage is unordered; sort so output is stable across parses.
    let mut attrs: Vec<(&str, &str)> = value
        .attrs()
        .filter(|(attr, _)| !attr.starts_with("data-"))
        .collect();
    attrs.sort_unstable();
    for (attr, val) in attrs {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_into(val, true, out);
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, false, out),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(child_el, out);
                }
            }
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Caps sanitized markup at `max` characters. Over the cap, `<form>`,
/// `<main>` and `<article>` sections (in that order) replace the page; only
/// if there are none, or they are still too long, is the text cut. A section
/// nested in, or containing, an already chosen one is skipped.
pub fn cap_content(html: &str, max: usize) -> String {
    if char_len(html) <= max {
        return html.to_string();
    }
    warn!(
        length = char_len(html),
        max, "page markup still too long after cleaning"
    );

    let sections = extract_sections(html);
    let candidate = if sections.is_empty() {
        html.to_string()
    } else {
        let joined = sections.concat();
        info!(
            sections = sections.len(),
            length = char_len(&joined),
            "using extracted form/main/article sections"
        );
        joined
    };

    if char_len(&candidate) <= max {
        return candidate;
    }
    warn!(max, "page markup truncated");
    truncate_with_marker(&candidate, max)
}

fn extract_sections(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut picked = Vec::new();
    let mut sections = Vec::new();

    for tag in PRIORITY_SECTIONS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        for el in document.select(&selector) {
            let overlaps = el.ancestors().any(|a| picked.contains(&a.id()))
                || el.descendants().any(|d| picked.contains(&d.id()));
            if overlaps {
                continue;
            }
            picked.push(el.id());
            let mut section = String::new();
            write_element(el, &mut section);
            sections.push(section);
        }
    }
    sections
}

/// Cuts `text` so that, marker included, it is at most `max` characters.
pub fn truncate_with_marker(text: &str, max: usize) -> String {
    if char_len(text) <= max {
        return text.to_string();
    }
    let marker_len = char_len(TRUNCATION_MARKER);
    if max <= marker_len {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Sign in  &amp; more</title>
    <link rel="stylesheet" href="/site.css">
    <style>body { color: red; }</style>
    <script>window.track = function() { return "</div>"; };</script>
  </head>
  <body data-turbo="true">
    <!-- nav -->
    <nav><a href="/" data-analytics="home">Home</a></nav>
    <svg viewBox="0 0 10 10"><path d="M0 0"/></svg>
    <main>
      <form action="/session" method="post">
        <label for="login_field">Username or email</label>
        <input id="login_field" name="login" type="text" data-test="user">
        <input type="hidden" name="csrf" value="xyz">
        <input name="password" type="password">
        <button type="submit">Sign in</button>
      </form>
      <div hidden><p>secret</p></div>
      <div style="display : none"><p>also secret</p></div>
      <pre>
  keep   me
</pre>
      <table><tr><td>a&lt;b</td></tr></table>
    </main>
    <footer><a href="/terms">Terms</a></footer>
  </body>
</html>"#;

    #[test]
    fn strips_noise() {
        let clean = sanitize_html(PAGE);
        for gone in [
            "<script", "<style", "<meta", "<link", "<svg", "<!--", "data-", "secret", "footer",
            "Terms", "csrf",
        ] {
            assert!(!clean.contains(gone), "{gone} survived: {clean}");
        }
        assert!(clean.contains(r#"<input id="login_field" name="login" type="text">"#));
        assert!(clean.contains("<button type=\"submit\">Sign in</button>"));
        assert!(clean.contains("Sign in &amp; more"));
        assert!(!clean.contains("  "));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_html(PAGE);
        let twice = sanitize_html(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_is_idempotent_on_messy_markup() {
        let messy = "<p>one <b>two<p>three</b> <script>x</script>  four<table>stray<tr><td>cell</table>\
                     <textarea>\n\nraw &lt;text&gt;</textarea><a href='/?a=1&b=\"2\"'>q</a>";
        let once = sanitize_html(messy);
        assert_eq!(sanitize_html(&once), once);
    }

    #[test]
    fn raw_text_elements_are_dropped_and_stable() {
        let html = "<body><p>keep</p><xmp>a&lt;b</xmp><noembed>x &amp; y</noembed>\
                    <noframes><b>z</b></noframes><p>tail</p></body>";
        let once = sanitize_html(html);
        assert_eq!(sanitize_html(&once), once);
        assert!(!once.contains("xmp"), "{once}");
        assert!(!once.contains("noembed"));
        assert!(!once.contains("&amp;amp;"));
        assert!(once.contains("<p>keep</p>"));
        assert!(once.contains("<p>tail</p>"));
    }

    #[test]
    fn short_content_is_untouched_by_cap() {
        assert_eq!(cap_content("<p>hi</p>", 100), "<p>hi</p>");
    }

    #[test]
    fn cap_prefers_form_main_article_sections() {
        let filler = "<p>filler text</p>".repeat(200);
        let html = format!(
            "<html><body><div>{filler}</div><form id=\"f\"><input name=\"q\"></form>\
             <article><h1>Story</h1></article></body></html>"
        );
        let capped = cap_content(&sanitize_html(&html), 500);
        assert!(char_len(&capped) <= 500);
        assert!(capped.starts_with("<form id=\"f\">"));
        assert!(capped.contains("<article><h1>Story</h1></article>"));
        assert!(!capped.contains("filler"));
    }

    #[test]
    fn nested_sections_are_not_duplicated() {
        let filler = "x".repeat(400);
        let html = format!("<html><body><p>{filler}</p><main><form><input name=\"a\"></form></main></body></html>");
        let capped = cap_content(&html, 100);
        assert_eq!(capped.matches("<form>").count(), 1);
    }

    #[test]
    fn cap_truncates_when_no_sections() {
        let html = format!("<html><body><p>{}</p></body></html>", "y".repeat(1000));
        let capped = cap_content(&html, 120);
        assert_eq!(char_len(&capped), 120);
        assert!(capped.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn cap_truncates_oversized_sections() {
        let html = format!(
            "<html><body><p>{}</p><form>{}</form></body></html>",
            "a".repeat(300),
            "b".repeat(300)
        );
        let capped = cap_content(&html, 200);
        assert_eq!(char_len(&capped), 200);
        assert!(capped.starts_with("<form>bbb"));
        assert!(capped.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(50);
        let cut = truncate_with_marker(&text, 20);
        assert_eq!(char_len(&cut), 20);
        assert!(cut.starts_with("ééééé"));
    }

    #[test]
    fn processor_output_never_exceeds_cap() {
        let processor = DomProcessor::new(300);
        let page = PAGE.replace("<main>", &format!("<main>{}", "<p>long</p>".repeat(100)));
        assert!(char_len(&processor.prune(&page)) <= 300);
        assert!(char_len(&processor.prune(PAGE)) <= 300);
    }
}
