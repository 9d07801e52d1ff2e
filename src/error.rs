//! Error taxonomy of the content store client.
//!
//! Every non-success response from the contents API is classified into one
//! of these variants and returned to the caller; nothing is retried.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("credential rejected (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },
    #[error("conflict writing {path} (HTTP {status}): {body}")]
    Conflict {
        path: String,
        status: u16,
        body: String,
    },
    #[error("remote store error (HTTP {status}): {body}")]
    Remote { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which kind of call produced a failing response. Token conflicts only
/// make sense for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Read,
    Write,
}

impl StoreError {
    /// Classify a non-success response.
    pub(crate) fn from_status(op: Operation, path: &str, status: StatusCode, body: String) -> Self {
        let code = status.as_u16();
        match code {
            401 | 403 => StoreError::Unauthorized { status: code, body },
            404 => StoreError::NotFound {
                path: path.to_string(),
            },
            409 | 422 if op == Operation::Write => StoreError::Conflict {
                path: path.to_string(),
                status: code,
                body,
            },
            _ => StoreError::Remote { status: code, body },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// HTTP status of the failing response, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StoreError::NotFound { .. } => Some(404),
            StoreError::Unauthorized { status, .. }
            | StoreError::Conflict { status, .. }
            | StoreError::Remote { status, .. } => Some(*status),
            StoreError::Network(_) | StoreError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}
