//! Helpers for Telegram's HTML parse mode.
//!
//! Telegram accepts only a handful of inline tags. Text authored elsewhere
//! (scheduled posts, deep links, greetings) is passed through
//! [`clean_tag_message`] before sending so unsupported markup never reaches the API.

use once_cell::sync::Lazy;
use regex::Regex;

const ALLOWED_TAGS: [&str; 11] = [
    "b", "strong", "i", "em", "u", "ins", "s", "strike", "a", "code", "pre",
];

#[allow(clippy::expect_used)]
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("html tag regex")
});

#[allow(clippy::expect_used)]
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href regex"));

/// Removes every HTML tag except the ones Telegram understands and replaces
/// non-breaking spaces with plain spaces. Text inside stripped tags is kept.
pub fn clean_tag_message(text: &str) -> String {
    let cleaned = TAG_RE.replace_all(text, |caps: &regex::Captures| {
        let Some(name) = caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) else {
            return String::new();
        };
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            return String::new();
        }
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            return format!("</{name}>");
        }
        if name == "a" {
            let attrs = caps.get(3).map_or("", |m| m.as_str());
            return match HREF_RE.captures(attrs) {
                Some(href) => {
                    let url = href.get(1).or_else(|| href.get(2)).map_or("", |m| m.as_str());
                    format!("<a href=\"{url}\">")
                }
                None => "<a>".to_string(),
            };
        }
        format!("<{name}>")
    });

    cleaned.replace("&nbsp;", " ").replace('\u{00a0}', " ")
}

/// Escapes text for safe interpolation into an HTML message.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Cuts `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_allowed_tags() {
        assert_eq!(clean_tag_message("<b>bold</b> and <i>it</i>"), "<b>bold</b> and <i>it</i>");
        assert_eq!(clean_tag_message("<STRONG>x</STRONG>"), "<strong>x</strong>");
    }

    #[test]
    fn test_strips_unknown_tags_but_keeps_text() {
        assert_eq!(clean_tag_message("<p>Hello <span class=\"x\">world</span></p>"), "Hello world");
        assert_eq!(clean_tag_message("a<br/>b"), "ab");
        assert_eq!(clean_tag_message("<!-- note -->text"), "text");
    }

    #[test]
    fn test_links_keep_only_href() {
        assert_eq!(
            clean_tag_message(r#"<a href="https://example.com" target="_blank" style="x">go</a>"#),
            r#"<a href="https://example.com">go</a>"#
        );
        assert_eq!(clean_tag_message("<a href='tg://resolve?domain=x'>t</a>"), r#"<a href="tg://resolve?domain=x">t</a>"#);
    }

    #[test]
    fn test_replaces_non_breaking_spaces() {
        assert_eq!(clean_tag_message("a&nbsp;b\u{00a0}c"), "a b c");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
        assert_eq!(escape_html("Київ"), "Київ");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("Привіт", 3), "При");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 1), "");
    }
}
