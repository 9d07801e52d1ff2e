//! Publish local post files to the content store.
//!
//! Creates the remote file when it does not exist yet and otherwise updates
//! it with the token read just before the write. A concurrent edit between
//! the read and the write surfaces as [`StoreError::Conflict`].

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::error::StoreError;
use crate::github::ContentStore;
use crate::models::CommitResult;

/// Outcome of [`publish_file`].
#[derive(Debug)]
pub struct Published {
    pub path: String,
    pub created: bool,
    pub commit: CommitResult,
}

/// Remote path for a local file under `remote_dir`.
pub fn remote_path(remote_dir: &str, filename: &str) -> String {
    let dir = remote_dir.trim_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    }
}

/// Push `local` to `<remote_dir>/<file name>`.
pub async fn publish_file(
    store: &dyn ContentStore,
    local: &Path,
    remote_dir: &str,
    message: Option<&str>,
) -> Result<Published> {
    let filename = local
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("not a file: {}", local.display()))?;
    let content = std::fs::read_to_string(local)
        .with_context(|| format!("Failed to read {}", local.display()))?;

    let path = remote_path(remote_dir, &filename);
    publish_content(store, &path, &content, message).await
}

/// Create or update `path` with `content`.
pub async fn publish_content(
    store: &dyn ContentStore,
    path: &str,
    content: &str,
    message: Option<&str>,
) -> Result<Published> {
    let existing = match store.handle(path).await {
        Ok(handle) => Some(handle),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e).with_context(|| format!("Failed to look up {}", path)),
    };

    let created = existing.is_none();
    let filename = path.rsplit('/').next().unwrap_or(path);
    let default_message = if created {
        format!("Create post {}", filename)
    } else {
        format!("Update post {}", filename)
    };
    let message = message.unwrap_or(&default_message);

    let commit = store
        .create_or_update(
            path,
            content,
            message,
            existing.as_ref().map(|h| h.sha.as_str()),
            None,
        )
        .await
        .with_context(|| format!("Failed to publish {}", path))?;

    info!(path, created, "published post");
    Ok(Published {
        path: path.to_string(),
        created,
        commit,
    })
}

/// Delete `path` using its current token.
pub async fn unpublish(
    store: &dyn ContentStore,
    path: &str,
    message: Option<&str>,
) -> Result<CommitResult> {
    let handle = store
        .handle(path)
        .await
        .with_context(|| format!("Failed to look up {}", path))?;
    let default_message = format!("Delete post {}", path);
    let commit = store
        .delete(
            &handle.path,
            &handle.sha,
            message.unwrap_or(&default_message),
            None,
        )
        .await
        .with_context(|| format!("Failed to delete {}", path))?;
    info!(path, "unpublished post");
    Ok(commit)
}
