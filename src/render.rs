//! Post rendering.
//!
//! Turns a [`Post`] into the committed HTML document. The metadata lives in
//! `<title>` and `<meta>` tags so [`crate::posts::parse_post`] can read it
//! back without a separate index file.

use anyhow::{bail, Result};

use crate::models::Post;

/// URL-safe file stem for a title: lowercase ASCII alphanumerics joined by `-`.
pub fn slugify(title: &str) -> Result<String> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        bail!("cannot derive a file name from title: {:?}", title);
    }
    Ok(slug)
}

/// `<dir>/<slug>.html`
pub fn post_path(dir: &str, title: &str) -> Result<String> {
    let slug = slugify(title)?;
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        Ok(format!("{}.html", slug))
    } else {
        Ok(format!("{}/{}.html", dir, slug))
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Full HTML document for `post`. The body is inserted verbatim.
pub fn render_post(post: &Post) -> String {
    let mut meta = vec![
        meta_tag("date", &post.date),
        meta_tag("tags", &post.tags.join(", ")),
        meta_tag("category", &post.category),
    ];
    if let Some(author) = &post.author {
        meta.insert(1, meta_tag("author", author));
    }

    let excerpt = post
        .excerpt
        .as_deref()
        .map(|e| format!("    <p class=\"excerpt\">{}</p>\n", escape_html(e)))
        .unwrap_or_default();

    let title = escape_html(&post.title);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\">\n");
    html.push_str(&format!("  <title>{}</title>\n", title));
    html.push_str(&meta.concat());
    html.push_str("</head>\n<body>\n  <article>\n");
    html.push_str(&format!("    <h1>{}</h1>\n", title));
    html.push_str("    <div class=\"content\">\n");
    html.push_str(&excerpt);
    html.push_str(post.body.trim_end());
    html.push_str("\n    </div>\n  </article>\n</body>\n</html>\n");
    html
}

fn meta_tag(name: &str, content: &str) -> String {
    format!(
        "  <meta name=\"{}\" content=\"{}\">\n",
        name,
        escape_html(content)
    )
}
