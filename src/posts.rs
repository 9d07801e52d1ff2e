//! Local post index.
//!
//! Reads a flat directory of rendered post files (`*.html`), extracts their
//! metadata, and answers list and search queries. Used by the HTTP server
//! and the `blogsync posts` commands.
//!
//! # Metadata
//!
//! | Field | Source |
//! |-------|--------|
//! | title | `<title>` |
//! | date, author, category | `<meta name="..." content="...">` |
//! | tags | `<meta name="tags">`, comma separated |
//! | excerpt | first `<p>` inside the `content` element, 200 chars |
//!
//! # Search
//!
//! A post matches when the term is a case-insensitive substring of its
//! title, any tag, or its category. Each result's excerpt becomes a window
//! of the post text around the first occurrence of the term.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::models::PostSummary;

const EXCERPT_CHARS: usize = 200;
const PREVIEW_CHARS: usize = 150;
const WINDOW_BEFORE: usize = 60;
const WINDOW_AFTER: usize = 90;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
/// An element whose class list contains the `content` token.
static CONTENT_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?content(?:\s[^"']*)?["'][^>]*>"#,
    )
    .unwrap()
});
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body>").unwrap());
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<head\b[^>]*>.*?</head>")
        .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Failures of [`PostIndex`] operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Empty name, path separator, or `..`.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    #[error("post not found: {0}")]
    NotFound(String),
    #[error("{context}: {error}")]
    Io {
        context: String,
        error: std::io::Error,
    },
}

pub type IndexResult<T> = Result<T, IndexError>;

fn io_error(context: String) -> impl FnOnce(std::io::Error) -> IndexError {
    move |error| IndexError::Io { context, error }
}

/// A directory of post files.
#[derive(Debug, Clone)]
pub struct PostIndex {
    dir: PathBuf,
}

impl PostIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure_dir(&self) -> IndexResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(format!(
            "Failed to create posts directory: {}",
            self.dir.display()
        )))
    }

    /// All posts, newest first. Files that cannot be read are skipped.
    pub fn list(&self) -> IndexResult<Vec<PostSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| IndexError::Io {
                context: format!("Failed to scan posts directory: {}", self.dir.display()),
                error: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.ends_with(".html") {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(html) => posts.push(parse_post(&filename, &html)),
                Err(e) => warn!(file = %filename, error = %e, "skipping unreadable post"),
            }
        }

        sort_by_date_desc(&mut posts);
        Ok(posts)
    }

    /// Posts whose title, tags or category contain `term`, with excerpts
    /// replaced by a preview around the term.
    pub fn search(&self, term: &str) -> IndexResult<Vec<PostSummary>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let needle = term.to_lowercase();

        let results = self
            .list()?
            .into_iter()
            .filter(|post| matches_term(post, &needle))
            .map(|mut post| {
                post.excerpt = preview_text(&post.content, term);
                post
            })
            .collect();
        Ok(results)
    }

    /// Write `content` to `<dir>/<filename>`.
    pub fn save(&self, filename: &str, content: &str) -> IndexResult<PathBuf> {
        validate_filename(filename)?;
        self.ensure_dir()?;
        let path = self.dir.join(filename);
        std::fs::write(&path, content)
            .map_err(io_error(format!("Failed to write post: {}", path.display())))?;
        Ok(path)
    }

    /// Remove `<dir>/<filename>`.
    pub fn delete(&self, filename: &str) -> IndexResult<()> {
        let path = self.existing(filename)?;
        std::fs::remove_file(&path)
            .map_err(io_error(format!("Failed to delete post: {}", path.display())))
    }

    /// Raw contents of `<dir>/<filename>`.
    pub fn read(&self, filename: &str) -> IndexResult<String> {
        let path = self.existing(filename)?;
        std::fs::read_to_string(&path)
            .map_err(io_error(format!("Failed to read post: {}", path.display())))
    }

    fn existing(&self, filename: &str) -> IndexResult<PathBuf> {
        validate_filename(filename)?;
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(IndexError::NotFound(filename.to_string()));
        }
        Ok(path)
    }
}

/// Reject names that could escape the posts directory.
pub fn validate_filename(filename: &str) -> IndexResult<()> {
    if filename.trim().is_empty() {
        return Err(IndexError::InvalidFilename("must not be empty".to_string()));
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(IndexError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Extract a [`PostSummary`] from a rendered post document.
pub fn parse_post(filename: &str, html: &str) -> PostSummary {
    let id = filename
        .strip_suffix(".html")
        .unwrap_or(filename)
        .to_string();

    let title = TITLE_RE
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default();

    let mut date = None;
    let mut author = None;
    let mut tags = Vec::new();
    let mut category = None;

    for tag in META_RE.find_iter(html) {
        let mut name = None;
        let mut content = None;
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| unescape_html(m.as_str()))
                .unwrap_or_default();
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = Some(value.to_ascii_lowercase()),
                "content" => content = Some(value),
                _ => {}
            }
        }
        let (Some(name), Some(content)) = (name, content) else {
            continue;
        };
        match name.as_str() {
            "date" => date = Some(content),
            "author" => author = Some(content),
            "category" => category = Some(content),
            "tags" => {
                tags = content
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }
            _ => {}
        }
    }

    PostSummary {
        excerpt: excerpt(html),
        content: body_text(html),
        url: format!("/posts/{}", filename),
        id,
        title,
        date,
        author,
        tags,
        category,
    }
}

/// First paragraph of the `content` element (or of the document),
/// truncated to 200 characters.
fn excerpt(html: &str) -> String {
    let scope = CONTENT_OPEN_RE
        .find(html)
        .map(|m| &html[m.end()..])
        .unwrap_or(html);
    let paragraph = PARAGRAPH_RE
        .captures(scope)
        .or_else(|| PARAGRAPH_RE.captures(html))
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default();

    if paragraph.is_empty() {
        return paragraph;
    }
    let mut text: String = paragraph.chars().take(EXCERPT_CHARS).collect();
    text.push_str("...");
    text
}

/// Visible text of the document body.
fn body_text(html: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let body = BODY_RE
        .captures(&without_code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| without_code.to_string());
    clean_text(&body)
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    unescape_html(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn matches_term(post: &PostSummary, needle: &str) -> bool {
    post.title.to_lowercase().contains(needle)
        || post.tags.iter().any(|t| t.to_lowercase().contains(needle))
        || post
            .category
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(needle))
}

/// A window of `content` around the first case-insensitive occurrence of
/// `term`: 60 characters before and 90 after, with `...` where cut.
/// Without a match, the first 150 characters.
pub fn preview_text(content: &str, term: &str) -> String {
    let chars: Vec<char> = content.chars().collect();

    let Some(index) = find_ignore_case(&chars, term) else {
        let mut preview: String = chars.iter().take(PREVIEW_CHARS).collect();
        if chars.len() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        return preview;
    };

    let start = index.saturating_sub(WINDOW_BEFORE);
    let end = (index + WINDOW_AFTER).min(chars.len());

    let mut preview = String::new();
    if start > 0 {
        preview.push_str("...");
    }
    preview.extend(&chars[start..end]);
    if end < chars.len() {
        preview.push_str("...");
    }
    preview
}

fn find_ignore_case(haystack: &[char], term: &str) -> Option<usize> {
    let needle: Vec<char> = term.chars().collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

/// Newest first; undated posts last, ties by id.
fn sort_by_date_desc(posts: &mut [PostSummary]) {
    posts.sort_by(|a, b| {
        let da = a.date.as_deref().and_then(parse_date);
        let db = b.date.as_deref().and_then(parse_date);
        db.cmp(&da).then_with(|| a.id.cmp(&b.id))
    });
}
