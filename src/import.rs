//! Markdown import.
//!
//! Converts Markdown files with a `---` front-matter block into rendered
//! post documents, so an existing notes directory can seed the blog. The
//! body is rendered with `pulldown-cmark` (CommonMark plus tables and
//! strikethrough).
//!
//! ```text
//! ---
//! title: Git Workflow Guide
//! date: 2024-01-22
//! tags: [git, version control]
//! category: Development
//! ---
//! A practical guide...
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use pulldown_cmark::{html, Options, Parser};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::Post;
use crate::render::render_post;

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Parse a Markdown document with optional front matter into a [`Post`].
///
/// Missing fields fall back to `Untitled`, `Uncategorized`, and
/// `fallback_date`. The remaining text is rendered from Markdown to HTML.
pub fn parse_front_matter(text: &str, fallback_date: NaiveDate) -> Post {
    let mut post = Post {
        title: DEFAULT_TITLE.to_string(),
        author: None,
        date: fallback_date.format("%Y-%m-%d").to_string(),
        tags: Vec::new(),
        category: DEFAULT_CATEGORY.to_string(),
        body: String::new(),
        excerpt: None,
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut body_start = 0;

    if lines.first().map(|l| l.trim()) == Some("---") {
        // Unterminated front matter consumes the whole file.
        let end = lines[1..]
            .iter()
            .position(|l| l.trim() == "---")
            .map(|i| i + 1)
            .unwrap_or(lines.len());

        for line in &lines[1..end] {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = strip_quotes(value.trim());
            match key.trim().to_lowercase().as_str() {
                "title" => post.title = value.to_string(),
                "date" => post.date = value.to_string(),
                "author" => post.author = Some(value.to_string()),
                "category" => post.category = value.to_string(),
                "excerpt" | "description" => post.excerpt = Some(value.to_string()),
                "tags" => post.tags = parse_tags(value),
                _ => {}
            }
        }
        body_start = (end + 1).min(lines.len());
    }

    post.body = markdown_to_html(&lines[body_start..].join("\n"));
    post
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

/// `[a, "b"]` or `a, b`
fn parse_tags(value: &str) -> Vec<String> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|t| strip_quotes(t.trim()).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(
        markdown,
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
    );
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}

/// Render every `*.md` file in `src` into `dest/<stem>.html`.
///
/// Unreadable files are logged and skipped. Returns the written paths,
/// sorted.
pub fn import_dir(src: &Path, dest: &Path, fallback_date: NaiveDate) -> Result<Vec<PathBuf>> {
    if !src.is_dir() {
        anyhow::bail!("import source is not a directory: {}", src.display());
    }
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut written = Vec::new();
    for entry in WalkDir::new(src).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md")
        {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable markdown file");
                continue;
            }
        };

        let post = parse_front_matter(&text, fallback_date);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "post".to_string());
        let out = dest.join(format!("{}.html", stem));
        std::fs::write(&out, render_post(&post))
            .with_context(|| format!("Failed to write {}", out.display()))?;
        info!(from = %path.display(), to = %out.display(), "imported post");
        written.push(out);
    }

    written.sort();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::PostIndex;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    #[test]
    fn test_front_matter_fields() {
        let text = "---\nTitle: 'Git Workflow Guide'\ndate: 2024-01-22\ntags: [git, \"version control\"]\ncategory: Development\n---\nFirst line\ncontinues here.\n\nSecond & last.\n";
        let post = parse_front_matter(text, day());
        assert_eq!(post.title, "Git Workflow Guide");
        assert_eq!(post.date, "2024-01-22");
        assert_eq!(post.tags, vec!["git", "version control"]);
        assert_eq!(post.category, "Development");
        assert_eq!(
            post.body,
            "<p>First line\ncontinues here.</p>\n<p>Second &amp; last.</p>"
        );
    }

    #[test]
    fn test_defaults_without_front_matter() {
        let post = parse_front_matter("just text", day());
        assert_eq!(post.title, "Untitled");
        assert_eq!(post.category, "Uncategorized");
        assert_eq!(post.date, "2024-01-20");
        assert!(post.tags.is_empty());
        assert_eq!(post.body, "<p>just text</p>");
    }

    #[test]
    fn test_markdown_body_is_rendered() {
        let text = "---\ntitle: T\n---\n# Heading\n\nSome **bold** text\n\n- a\n- b\n\n```rust\nfn main() {}\n```\n";
        let body = parse_front_matter(text, day()).body;
        assert!(body.contains("<h1>Heading</h1>"), "{}", body);
        assert!(body.contains("<p>Some <strong>bold</strong> text</p>"));
        assert!(body.contains("<ul>\n<li>a</li>\n<li>b</li>\n</ul>"));
        assert!(body.contains("<pre><code class=\"language-rust\">fn main() {}\n</code></pre>"));
        assert!(!body.contains("**"));
    }

    #[test]
    fn test_comma_separated_tags() {
        let post = parse_front_matter("---\ntags: python, tips,\n---\n", day());
        assert_eq!(post.tags, vec!["python", "tips"]);
        assert_eq!(post.body, "");
    }

    #[test]
    fn test_import_dir_feeds_index() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(
            src.path().join("python-tips.md"),
            "---\ntitle: Python Tips\ndate: 2024-01-21\ntags: python\n---\nUse virtualenvs.\n",
        )
        .unwrap();
        std::fs::write(src.path().join("skip.txt"), "not markdown").unwrap();

        let written = import_dir(src.path(), dest.path(), day()).unwrap();
        assert_eq!(written, vec![dest.path().join("python-tips.html")]);

        let posts = PostIndex::new(dest.path()).list().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Python Tips");
        assert_eq!(posts[0].tags, vec!["python"]);
        assert_eq!(posts[0].excerpt, "Use virtualenvs....");
    }

    #[test]
    fn test_import_missing_source() {
        let dest = TempDir::new().unwrap();
        assert!(import_dir(&dest.path().join("nope"), dest.path(), day()).is_err());
    }
}
