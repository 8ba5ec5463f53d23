//! Shared error type across netpol crates.

use std::time::Duration;

use thiserror::Error;

/// Stable error categories (matched by callers and tests instead of messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid document or configuration.
    BadRequest,
    /// Unsupported config/document version.
    UnsupportedVersion,
    /// A rule variant failed to produce its derivative.
    Derivation,
    /// Object not present in the store.
    NotFound,
    /// Create lost a race against another writer.
    AlreadyExists,
    /// Transient store failure.
    Store,
    /// Poll ceiling reached.
    Timeout,
    /// External cancellation fired.
    Cancelled,
    /// Store refused the descriptor names.
    NameConflict,
    /// Install failed and cleanup failed too.
    Rollback,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Derivation => "DERIVATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::Store => "STORE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::NameConflict => "NAME_CONFLICT",
            ErrorCode::Rollback => "ROLLBACK",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, NetpolError>;

/// Unified error type used by core and agent.
#[derive(Debug, Error)]
pub enum NetpolError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("derivation failed: {0}")]
    Derivation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("store: {0}")]
    Store(String),
    #[error("timed out after {}ms waiting for {what}{}", .waited.as_millis(), fmt_last(.last))]
    Timeout {
        what: String,
        waited: Duration,
        last: Option<Box<NetpolError>>,
    },
    #[error("cancelled while waiting for {0}")]
    Cancelled(String),
    #[error("name conflict for {name}: {reason}")]
    NameConflict { name: String, reason: String },
    #[error("unable to delete {name} after failed install ({cause}): {delete}")]
    Rollback {
        name: String,
        cause: Box<NetpolError>,
        delete: Box<NetpolError>,
    },
    #[error("internal: {0}")]
    Internal(String),
}

fn fmt_last(last: &Option<Box<NetpolError>>) -> String {
    match last {
        Some(e) => format!(" (last error: {e})"),
        None => String::new(),
    }
}

impl NetpolError {
    /// Map the error to its stable category.
    pub fn code(&self) -> ErrorCode {
        match self {
            NetpolError::BadRequest(_) => ErrorCode::BadRequest,
            NetpolError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            NetpolError::Derivation(_) => ErrorCode::Derivation,
            NetpolError::NotFound(_) => ErrorCode::NotFound,
            NetpolError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            NetpolError::Store(_) => ErrorCode::Store,
            NetpolError::Timeout { .. } => ErrorCode::Timeout,
            NetpolError::Cancelled(_) => ErrorCode::Cancelled,
            NetpolError::NameConflict { .. } => ErrorCode::NameConflict,
            NetpolError::Rollback { .. } => ErrorCode::Rollback,
            NetpolError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// True for "object not present" store answers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetpolError::NotFound(_))
    }

    /// True when a create lost the race to another writer.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, NetpolError::AlreadyExists(_))
    }
}
