//! Shared error taxonomy.
//!
//! Every component-level error enum implements [`kind`](AppError::kind) so
//! callers at the HTTP boundary can map a failure to the right envelope
//! without matching on every leaf variant.

use thiserror::Error;

/// The taxonomy kinds a failure is classified into, independent of which
/// component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network timeout, 5xx, rate-limited. Retry with backoff; never
    /// surfaced as a user-facing error for a single occurrence.
    Transient,
    /// Provider responded authoritatively that no data exists.
    NotFound,
    /// Missing API key, invalid OAuth token past refresh.
    Misconfigured,
    /// Malformed cached file, invalid settings document.
    Corrupt,
    /// Port bind failure, single-instance lock held.
    Fatal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error("corrupt data at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Io(_) | AppError::Http(_) | AppError::Timeout(_) => ErrorKind::Transient,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Misconfigured(_) => ErrorKind::Misconfigured,
            AppError::Json(_) | AppError::Corrupt { .. } => ErrorKind::Corrupt,
            AppError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn misconfigured(msg: impl Into<String>) -> Self {
        AppError::Misconfigured(msg.into())
    }

    pub fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_as_expected() {
        assert_eq!(
            AppError::misconfigured("missing key").kind(),
            ErrorKind::Misconfigured
        );
        assert_eq!(
            AppError::corrupt("settings.json", "bad utf8").kind(),
            ErrorKind::Corrupt
        );
        assert_eq!(AppError::Fatal("port in use".into()).kind(), ErrorKind::Fatal);
        assert_eq!(AppError::NotFound("lyrics".into()).kind(), ErrorKind::NotFound);
    }
}
