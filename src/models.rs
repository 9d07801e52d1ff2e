//! Core data models shared by the content store client and the local index.
//!
//! Remote types ([`ContentEntry`], [`RemoteFile`], [`CommitResult`]) mirror
//! the GitHub contents API JSON. Local types ([`Post`], [`PostSummary`])
//! describe posts as the editor writes them and the index serves them.

use serde::{Deserialize, Serialize};

/// A blog post as authored, before it is rendered to HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub author: Option<String>,
    /// ISO date (`YYYY-MM-DD`) as written into the `date` meta tag.
    pub date: String,
    pub tags: Vec<String>,
    pub category: String,
    /// Opaque HTML payload.
    pub body: String,
    pub excerpt: Option<String>,
}

/// Summary of a post file as returned by the index service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    /// File stem, e.g. `product-launch` for `product-launch.html`.
    pub id: String,
    pub title: String,
    pub date: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub excerpt: String,
    pub url: String,
    /// Visible text of the post body, used for context-window previews.
    pub content: String,
}

/// Identity of a file at the remote store at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileHandle {
    pub path: String,
    /// Content-hash token required for safe update and delete.
    pub sha: String,
    pub branch: Option<String>,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    /// `file`, `dir`, `symlink` or `submodule`.
    #[serde(rename = "type", default = "default_entry_type")]
    pub kind: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

fn default_entry_type() -> String {
    "file".to_string()
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// A file fetched with `read`, including its encoded content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    #[serde(flatten)]
    pub entry: ContentEntry,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Commit metadata returned by writes and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Response body of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// The committed file; `None` after a delete.
    pub content: Option<ContentEntry>,
    pub commit: CommitInfo,
}

/// How the branch for an operation was determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchResolution {
    /// Supplied at construction or per call.
    Explicit(String),
    /// Read from the repository's `default_branch`.
    Remote(String),
    /// Repository metadata could not be read; the documented default is used.
    Fallback { name: String, reason: String },
}

impl BranchResolution {
    pub fn name(&self) -> &str {
        match self {
            BranchResolution::Explicit(name) | BranchResolution::Remote(name) => name,
            BranchResolution::Fallback { name, .. } => name,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BranchResolution::Fallback { .. })
    }
}
