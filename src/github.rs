//! GitHub repository-contents client.
//!
//! Persists posts as committed files in a GitHub repository through the
//! [contents API](https://docs.github.com/en/rest/repos/contents). Every
//! mutating call is a single commit; the client never batches files and
//! never retries.
//!
//! # Addressing
//!
//! The base address is `<api_url>/repos/<owner>/<repo>`. Reads and listings
//! use `<base>/contents/<path>?ref=<branch>` when a branch is known (passed
//! per call or configured), and the legacy `<base>/contents/<path>` when it
//! is not, letting the store pick its default branch. Writes always carry
//! the branch in their JSON payload, resolving it first if needed.
//!
//! # Directory materialization
//!
//! The store has no empty directories. Before every write,
//! [`ContentStore::create_or_update`] lists the parent directory; when that
//! listing fails it commits a placeholder (`README.md` by default) into the
//! parent, once, and then performs the target write. The caller always
//! sees the result of the target write.
//!
//! # Errors
//!
//! | Status | Read / list | Write / delete |
//! |--------|-------------|----------------|
//! | 401, 403 | `Unauthorized` | `Unauthorized` |
//! | 404 | `NotFound` | `NotFound` |
//! | 409, 422 | `Remote` | `Conflict` |
//! | other | `Remote` | `Remote` |
//!
//! Transport failures are `Network`; undecodable success bodies are `Decode`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::GithubConfig;
use crate::error::{Operation, StoreError, StoreResult};
use crate::models::{BranchResolution, CommitResult, ContentEntry, RemoteFile, RemoteFileHandle};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Branch used when none is configured and the repository metadata cannot be read.
pub const FALLBACK_BRANCH: &str = "main";

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Address prefixes users tend to paste in front of an owner or repo name.
const ADDRESS_PREFIXES: &[&str] = &[
    "https://api.github.com/repos/",
    "https://github.com/",
    "http://github.com/",
    "github.com/",
];

/// Strip a pasted address prefix so only the bare identifier remains.
///
/// ```
/// use blog_sync::github::normalize_identifier;
/// assert_eq!(normalize_identifier("https://github.com/acme"), "acme");
/// assert_eq!(normalize_identifier("blog"), "blog");
/// ```
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    ADDRESS_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .to_string()
}

/// Strip leading `/` from a repository path.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// The directory containing `path`, or `None` for files at the repository root.
pub fn parent_dir(path: &str) -> Option<&str> {
    normalize_path(path)
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// Decode the inline content of a fetched file to UTF-8 text.
pub fn decode_content(file: &RemoteFile) -> StoreResult<String> {
    let content = file
        .content
        .as_deref()
        .ok_or_else(|| StoreError::Decode(format!("{} has no inline content", file.entry.path)))?;

    match file.encoding.as_deref() {
        Some("base64") => {
            // The API wraps base64 at 60 columns.
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| StoreError::Decode(format!("{}: {}", file.entry.path, e)))?;
            String::from_utf8(bytes)
                .map_err(|e| StoreError::Decode(format!("{}: {}", file.entry.path, e)))
        }
        Some("none") => Err(StoreError::Decode(format!(
            "{} is too large for inline content",
            file.entry.path
        ))),
        _ => Ok(content.to_string()),
    }
}

/// Operations on a remote tree of text files.
///
/// [`GithubClient`] is the production implementation; the publish workflow
/// only depends on this trait.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the file at `path`.
    ///
    /// Directory paths go through [`ContentStore::list`]; reading one fails
    /// with [`StoreError::Decode`].
    async fn read(&self, path: &str) -> StoreResult<RemoteFile>;

    /// List the directory at `path`.
    async fn list(&self, path: &str, branch: Option<&str>) -> StoreResult<Vec<ContentEntry>>;

    /// Commit `content` at `path`. Without `sha` this is a create, with it
    /// an update guarded by that token.
    async fn create_or_update(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
        branch: Option<&str>,
    ) -> StoreResult<CommitResult>;

    /// Remove the object at `path`; `sha` must be its current token.
    async fn delete(
        &self,
        path: &str,
        sha: &str,
        message: &str,
        branch: Option<&str>,
    ) -> StoreResult<CommitResult>;

    /// The branch operations target. Never fails.
    async fn resolve_branch(&self) -> BranchResolution;

    /// Current token of the file at `path`.
    async fn handle(&self, path: &str) -> StoreResult<RemoteFileHandle> {
        let file = self.read(path).await?;
        Ok(RemoteFileHandle {
            path: file.entry.path,
            sha: file.entry.sha,
            branch: None,
        })
    }

    /// Fetch and decode the file at `path`.
    async fn read_text(&self, path: &str) -> StoreResult<(String, RemoteFileHandle)> {
        let file = self.read(path).await?;
        let text = decode_content(&file)?;
        Ok((
            text,
            RemoteFileHandle {
                path: file.entry.path,
                sha: file.entry.sha,
                branch: None,
            },
        ))
    }
}

/// Tunables for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_url: String,
    pub timeout: Duration,
    pub placeholder_name: String,
    /// Memoize the first successful default-branch lookup.
    pub cache_branch: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            placeholder_name: "README.md".to_string(),
            cache_branch: false,
        }
    }
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

/// Contents API client for one repository.
///
/// Construct once and share by reference; all methods take `&self`.
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    base: Url,
    placeholder_name: String,
    branch_cache: Option<OnceCell<String>>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Client against `api.github.com` with default options.
    pub fn new(
        token: impl Into<String>,
        owner: &str,
        repo: &str,
        branch: Option<String>,
    ) -> StoreResult<Self> {
        Self::with_options(token, owner, repo, branch, ClientOptions::default())
    }

    pub fn with_options(
        token: impl Into<String>,
        owner: &str,
        repo: &str,
        branch: Option<String>,
        options: ClientOptions,
    ) -> StoreResult<Self> {
        let owner = normalize_identifier(owner);
        let repo = normalize_identifier(repo);

        let mut base = Url::parse(options.api_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Decode(format!("invalid api url {}: {}", options.api_url, e)))?;
        base.path_segments_mut()
            .map_err(|_| StoreError::Decode(format!("invalid api url {}", options.api_url)))?
            .pop_if_empty()
            .extend(["repos", owner.as_str(), repo.as_str()]);

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("blog-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        debug!(owner = %owner, repo = %repo, base = %base, "content store client configured");

        Ok(Self {
            http,
            token: token.into(),
            owner,
            repo,
            branch: branch.filter(|b| !b.trim().is_empty()),
            base,
            placeholder_name: options.placeholder_name,
            branch_cache: options.cache_branch.then(OnceCell::new),
        })
    }

    /// Build a client from the `[github]` config section, reading the
    /// credential from the configured environment variable.
    pub fn from_config(config: &GithubConfig) -> anyhow::Result<Self> {
        let token = config.token()?;
        let options = ClientOptions {
            api_url: config.api_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            placeholder_name: config.placeholder_name.clone(),
            cache_branch: config.cache_branch,
        };
        Ok(Self::with_options(
            token,
            &config.owner,
            &config.repo,
            config.branch.clone(),
            options,
        )?)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The explicitly configured branch, if any.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// `<api_url>/repos/<owner>/<repo>`
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Address of `path` under `/contents`, with `?ref=` when a branch is given.
    pub fn contents_url(&self, path: &str, branch: Option<&str>) -> StoreResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Decode(format!("invalid base url {}", self.base)))?;
            segments.push("contents");
            // Keeps a trailing slash on directory paths like `posts/`.
            segments.extend(normalize_path(path).split('/'));
        }
        if let Some(branch) = branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        op: Operation,
        path: &str,
        req: RequestBuilder,
    ) -> StoreResult<T> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(StoreError::from)?;

        if !status.is_success() {
            debug!(%status, path, body = %body, "contents API returned an error");
            return Err(StoreError::from_status(op, path, status, body));
        }

        serde_json::from_str(&body)
            .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
    }

    /// Branch for reads: the per-call one, the configured one, or a cached
    /// resolution. `None` selects the legacy address shape.
    fn read_branch<'a>(&'a self, branch: Option<&'a str>) -> Option<&'a str> {
        branch
            .or(self.branch.as_deref())
            .or_else(|| self.branch_cache.as_ref().and_then(|c| c.get()).map(String::as_str))
    }

    async fn write_branch(&self, branch: Option<&str>) -> String {
        match branch {
            Some(b) => b.to_string(),
            None => self.resolve_branch().await.name().to_string(),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
        branch: &str,
    ) -> StoreResult<CommitResult> {
        let mut payload = serde_json::json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = serde_json::Value::String(sha.to_string());
        }

        let url = self.contents_url(path, None)?;
        self.send(
            Operation::Write,
            path,
            self.request(Method::PUT, url).json(&payload),
        )
        .await
    }

    /// Make sure `dir` exists, committing a placeholder when its listing
    /// fails. Returns whether a placeholder write was attempted.
    async fn ensure_directory(&self, dir: &str, branch: &str) -> bool {
        match self.list(dir, Some(branch)).await {
            Ok(_) => return false,
            Err(e) => debug!(dir, error = %e, "parent directory listing failed, materializing"),
        }

        let placeholder = format!("{}/{}", dir, self.placeholder_name);
        let content = format!("# {}\n", dir);
        let message = format!("Create {} directory", dir);

        match self
            .put_file(&placeholder, &content, &message, None, branch)
            .await
        {
            Ok(_) => info!(path = %placeholder, "created directory placeholder"),
            Err(e) => warn!(path = %placeholder, error = %e, "directory placeholder write failed"),
        }
        true
    }

    async fn fetch_default_branch(&self) -> StoreResult<String> {
        let info: RepoInfo = self
            .send(
                Operation::Read,
                self.base.path(),
                self.request(Method::GET, self.base.clone()),
            )
            .await?;
        if info.default_branch.is_empty() {
            return Err(StoreError::Decode("empty default_branch".to_string()));
        }
        Ok(info.default_branch)
    }
}

#[async_trait]
impl ContentStore for GithubClient {
    #[tracing::instrument(skip(self))]
    async fn read(&self, path: &str) -> StoreResult<RemoteFile> {
        let path = normalize_path(path);
        let url = self.contents_url(path, self.read_branch(None))?;
        let value: serde_json::Value = self
            .send(Operation::Read, path, self.request(Method::GET, url))
            .await?;
        if value.is_array() {
            return Err(StoreError::Decode(format!("{} is a directory", path)));
        }
        serde_json::from_value(value).map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, path: &str, branch: Option<&str>) -> StoreResult<Vec<ContentEntry>> {
        let path = normalize_path(path);
        let url = self.contents_url(path, self.read_branch(branch))?;
        let value: serde_json::Value = self
            .send(Operation::Read, path, self.request(Method::GET, url))
            .await?;

        let decoded = if value.is_array() {
            serde_json::from_value(value)
        } else {
            // A file path lists as itself.
            serde_json::from_value(value).map(|entry| vec![entry])
        };
        decoded.map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
    }

    #[tracing::instrument(skip(self, content))]
    async fn create_or_update(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
        branch: Option<&str>,
    ) -> StoreResult<CommitResult> {
        let path = normalize_path(path);
        let branch = self.write_branch(branch).await;

        let placeholder = match parent_dir(path) {
            Some(parent) => self.ensure_directory(parent, &branch).await,
            None => false,
        };

        let result = self.put_file(path, content, message, sha, &branch).await;
        match &result {
            Ok(commit) => info!(
                path,
                branch = %branch,
                placeholder,
                commit = %commit.commit.sha,
                "committed file"
            ),
            Err(e) => warn!(path, branch = %branch, placeholder, error = %e, "write failed"),
        }
        result
    }

    #[tracing::instrument(skip(self))]
    async fn delete(
        &self,
        path: &str,
        sha: &str,
        message: &str,
        branch: Option<&str>,
    ) -> StoreResult<CommitResult> {
        let path = normalize_path(path);
        let branch = self.write_branch(branch).await;
        let payload = serde_json::json!({
            "message": message,
            "sha": sha,
            "branch": branch,
        });

        let url = self.contents_url(path, None)?;
        let result: StoreResult<CommitResult> = self
            .send(
                Operation::Write,
                path,
                self.request(Method::DELETE, url).json(&payload),
            )
            .await;
        match &result {
            Ok(_) => info!(path, branch = %branch, "deleted file"),
            Err(e) => warn!(path, branch = %branch, error = %e, "delete failed"),
        }
        result
    }

    #[tracing::instrument(skip(self))]
    async fn resolve_branch(&self) -> BranchResolution {
        if let Some(branch) = &self.branch {
            return BranchResolution::Explicit(branch.clone());
        }
        if let Some(cached) = self.branch_cache.as_ref().and_then(|c| c.get()) {
            return BranchResolution::Remote(cached.clone());
        }

        match self.fetch_default_branch().await {
            Ok(name) => {
                if let Some(cache) = &self.branch_cache {
                    let _ = cache.set(name.clone());
                }
                BranchResolution::Remote(name)
            }
            Err(e) => {
                warn!(error = %e, fallback = FALLBACK_BRANCH, "default branch lookup failed");
                BranchResolution::Fallback {
                    name: FALLBACK_BRANCH.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn handle(&self, path: &str) -> StoreResult<RemoteFileHandle> {
        let file = self.read(path).await?;
        Ok(RemoteFileHandle {
            path: file.entry.path,
            sha: file.entry.sha,
            branch: self.read_branch(None).map(str::to_string),
        })
    }

    async fn read_text(&self, path: &str) -> StoreResult<(String, RemoteFileHandle)> {
        let file = self.read(path).await?;
        let text = decode_content(&file)?;
        Ok((
            text,
            RemoteFileHandle {
                path: file.entry.path,
                sha: file.entry.sha,
                branch: self.read_branch(None).map(str::to_string),
            },
        ))
    }
}
