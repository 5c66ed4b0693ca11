//! Crate-wide error type.
//!
//! Errors are grouped by how callers react to them: validation errors are
//! surfaced and never retried, transport errors abort the current phase or
//! asset, conflicts come from local uniqueness constraints, and not-found is
//! frequently a signal to create instead of update.

use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Unrecognized taxonomy value or unclassifiable media.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-2xx response or network failure against an external catalog.
    #[error("Transport error ({context}): {message}")]
    Transport {
        context: String,
        status: Option<u16>,
        message: String,
    },

    /// Local uniqueness violation, usually from concurrent creation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode {context}: {message}")]
    Decode { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn transport(context: impl Into<String>, err: reqwest::Error) -> Self {
        SyncError::Transport {
            context: context.into(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    pub fn http_status(context: impl Into<String>, status: reqwest::StatusCode) -> Self {
        SyncError::Transport {
            context: context.into(),
            status: Some(status.as_u16()),
            message: format!("responded with status code {}", status),
        }
    }

    pub fn decode(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::Transport { .. } => "transport",
            SyncError::Conflict(_) => "conflict",
            SyncError::NotFound(_) => "not_found",
            SyncError::Storage(_) => "storage",
            SyncError::Io(_) => "io",
            SyncError::Decode { .. } => "decode",
            SyncError::Cancelled => "cancelled",
        }
    }
}

/// Maps SQLite constraint violations to [`SyncError::Conflict`] and keeps the
/// rest as storage errors.
pub(crate) fn storage_err(context: &str, err: rusqlite::Error) -> SyncError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            SyncError::Conflict(format!(
                "{}: {}",
                context,
                msg.clone().unwrap_or_else(|| e.to_string())
            ))
        }
        _ => SyncError::Storage(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (name TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('a')", [])
            .unwrap_err();

        let mapped = storage_err("insert t", err);
        assert!(mapped.is_conflict());
        assert_eq!(mapped.kind(), "conflict");
    }

    #[test]
    fn test_other_sqlite_errors_stay_storage() {
        let mapped = storage_err("query", rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(mapped, SyncError::Storage(_)));
    }
}
