//! Plain-text helpers over entry markup.
//!
//! Entries are stored as the rich-text editor's serialized HTML. Titles,
//! previews and word counts are derived from the text with tags removed.

use regex::Regex;
use std::sync::LazyLock;

/// Words per minute used for reading-time estimates.
pub const READING_WPM: i64 = 200;

/// Maximum title length (in characters) derived from content.
pub const TITLE_MAX_CHARS: usize = 50;

/// Preview length (in characters) used by entry listings.
pub const PREVIEW_MAX_CHARS: usize = 100;

pub const UNTITLED: &str = "Untitled Entry";

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

// Block boundaries become line breaks so adjacent paragraphs do not fuse
// into one word once tags are removed.
static BLOCK_BREAK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote|pre)\s*>").unwrap()
});

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Remove every tag, leaving only text.
pub fn strip_tags(markup: &str) -> String {
    TAG_REGEX.replace_all(markup, "").into_owned()
}

/// Text content of `markup` with block elements separated by newlines.
pub fn plain_text(markup: &str) -> String {
    let broken = BLOCK_BREAK_REGEX.replace_all(markup, "\n");
    strip_tags(&broken).trim().to_string()
}

pub fn word_count(markup: &str) -> i64 {
    plain_text(markup).split_whitespace().count() as i64
}

/// Estimated reading time in whole minutes, rounded up.
pub fn reading_time(word_count: i64) -> i64 {
    (word_count + READING_WPM - 1) / READING_WPM
}

/// Title derived from the first line of text.
pub fn extract_title(markup: &str) -> String {
    let text = plain_text(markup);
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return UNTITLED.to_string();
    }
    truncate_chars(first_line, TITLE_MAX_CHARS)
}

/// Single-line preview: whitespace collapsed, cut at `max_chars`.
pub fn extract_preview(markup: &str, max_chars: usize) -> String {
    let text = plain_text(markup);
    let collapsed = WHITESPACE_REGEX.replace_all(&text, " ");
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_markup() {
        assert_eq!(strip_tags("<p>Hello <strong>there</strong></p>"), "Hello there");
    }

    #[test]
    fn test_word_count_separates_paragraphs() {
        assert_eq!(word_count("<p>Hello</p><p>World</p>"), 2);
        assert_eq!(word_count("<p>one two  three</p>"), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<p></p>"), 0);
    }

    #[test]
    fn test_reading_time_rounds_up() {
        assert_eq!(reading_time(0), 0);
        assert_eq!(reading_time(1), 1);
        assert_eq!(reading_time(200), 1);
        assert_eq!(reading_time(201), 2);
    }

    #[test]
    fn test_extract_title_uses_first_line() {
        assert_eq!(
            extract_title("<h1>Morning pages</h1><p>Slept badly.</p>"),
            "Morning pages"
        );
    }

    #[test]
    fn test_extract_title_truncates_long_lines() {
        let long = "a".repeat(60);
        let title = extract_title(&format!("<p>{}</p>", long));
        assert_eq!(title, format!("{}...", "a".repeat(50)));
    }

    #[test]
    fn test_extract_title_falls_back_when_empty() {
        assert_eq!(extract_title("<p>   </p>"), UNTITLED);
        assert_eq!(extract_title(""), UNTITLED);
    }

    #[test]
    fn test_extract_title_handles_multibyte_text() {
        let text = "é".repeat(55);
        let title = extract_title(&text);
        assert_eq!(title.chars().count(), 53);
    }

    #[test]
    fn test_extract_preview_collapses_whitespace() {
        let preview = extract_preview("<p>First\n\n line</p><p>second</p>", PREVIEW_MAX_CHARS);
        assert_eq!(preview, "First line second");
    }

    #[test]
    fn test_extract_preview_truncates() {
        let preview = extract_preview(&"word ".repeat(40), 10);
        assert_eq!(preview, "word word ...");
    }
}
