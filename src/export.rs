//! Markdown export of journal entries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::Entry;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const ARCHIVE_TITLE: &str = "# Journal Entries Archive";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_private: bool,
}

fn default_include_metadata() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_private: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub content: String,
}

/// Ordered (pattern, replacement) pairs. Inline elements are handled
/// before their block containers.
static HTML_TO_MARKDOWN: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)<h1[^>]*>(.*?)</h1>", "# $1\n\n"),
        (r"(?i)<h2[^>]*>(.*?)</h2>", "## $1\n\n"),
        (r"(?i)<h3[^>]*>(.*?)</h3>", "### $1\n\n"),
        (r"(?i)<h4[^>]*>(.*?)</h4>", "#### $1\n\n"),
        (r"(?i)<h5[^>]*>(.*?)</h5>", "##### $1\n\n"),
        (r"(?i)<h6[^>]*>(.*?)</h6>", "###### $1\n\n"),
        (r"(?i)<strong[^>]*>(.*?)</strong>", "**$1**"),
        (r"(?i)<b(?:\s[^>]*)?>(.*?)</b>", "**$1**"),
        (r"(?i)<em[^>]*>(.*?)</em>", "*$1*"),
        (r"(?i)<i(?:\s[^>]*)?>(.*?)</i>", "*$1*"),
        (r"(?i)<code[^>]*>(.*?)</code>", "`$1`"),
        (r"(?i)<blockquote[^>]*>(.*?)</blockquote>", "> $1\n\n"),
        (r"(?i)<ul[^>]*>(.*?)</ul>", "$1\n"),
        (r"(?i)<ol[^>]*>(.*?)</ol>", "$1\n"),
        (r"(?i)<li[^>]*>(.*?)</li>", "- $1\n"),
        (r"(?i)<br\s*/?>", "\n"),
        (r"(?i)<p(?:\s[^>]*)?>(.*?)</p>", "$1\n\n"),
        (r"(?i)<div[^>]*>(.*?)</div>", "$1\n"),
        (r"<[^>]*>", ""),
        (r"\n\n\n+", "\n\n"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s-]").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Basic HTML to Markdown conversion for editor output.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.to_string();
    for (pattern, replacement) in HTML_TO_MARKDOWN.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text.trim().to_string()
}

fn format_timestamp(raw: &str, fmt: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).format(fmt).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

pub fn entry_markdown(entry: &Entry, opts: &ExportOptions) -> String {
    let mut markdown = format!("# {}\n\n", entry.title);

    if opts.include_metadata {
        markdown.push_str("---\n");
        markdown.push_str(&format!(
            "Created: {}\n",
            format_timestamp(&entry.created_at, DATE_TIME_FORMAT)
        ));
        markdown.push_str(&format!(
            "Updated: {}\n",
            format_timestamp(&entry.updated_at, DATE_TIME_FORMAT)
        ));
        markdown.push_str(&format!("Word Count: {}\n", entry.word_count));
        markdown.push_str(&format!("Private: {}\n", yes_no(entry.is_private)));
        markdown.push_str(&format!("Favorite: {}\n", yes_no(entry.is_favorite)));
        markdown.push_str("---\n\n");
    }

    markdown.push_str(&html_to_markdown(&entry.content));
    markdown
}

/// `YYYY-MM-DD-<safe-title>.md`, dated by creation.
pub fn entry_filename(entry: &Entry) -> String {
    let safe = UNSAFE_FILENAME_CHARS.replace_all(&entry.title, "");
    let safe = WHITESPACE_RUN.replace_all(safe.trim(), "-");
    let safe = if safe.is_empty() { "untitled".into() } else { safe };
    format!("{}-{}.md", format_timestamp(&entry.created_at, "%Y-%m-%d"), safe)
}

/// One markdown file per exportable entry, in input order. Private entries
/// are dropped unless `include_private` is set. Clashing filenames get a
/// numeric suffix.
pub fn export_all(entries: &[Entry], opts: &ExportOptions) -> Vec<ExportFile> {
    let mut used = HashSet::new();
    entries
        .iter()
        .filter(|e| opts.include_private || !e.is_private)
        .map(|entry| {
            let base = entry_filename(entry);
            let mut filename = base.clone();
            let mut n = 2;
            while !used.insert(filename.clone()) {
                filename = format!("{}-{}.md", base.trim_end_matches(".md"), n);
                n += 1;
            }
            ExportFile {
                filename,
                content: entry_markdown(entry, opts),
            }
        })
        .collect()
}

/// Concatenate exported files into a single archive document.
pub fn bundle(files: &[ExportFile], generated_at: DateTime<Utc>) -> String {
    let mut archive = format!("{}\n\n", ARCHIVE_TITLE);
    archive.push_str(&format!(
        "Generated on: {}\n\n",
        generated_at.format(DATE_TIME_FORMAT)
    ));
    for file in files {
        archive.push_str(&format!("## {}\n\n", file.filename));
        archive.push_str(&file.content);
        archive.push_str("\n\n---\n\n");
    }
    archive
}

/// Write each file into `dir`, creating it if needed.
pub fn write_files(dir: &Path, files: &[ExportFile]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.filename);
        std::fs::write(&path, &file.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
