//! Error kinds surfaced by session and store operations.

use crate::backend::BackendError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of a session or store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// No authenticated user at call time.
    NotAuthenticated,
    /// Backend rejected or failed the call. Passed through unmodified.
    Remote(BackendError),
    /// Backend reported no row for the targeted id.
    NotFound(Uuid),
    /// Backend returned a row that does not decode into the entity shape.
    InvalidRow(String),
}

impl SyncError {
    /// Short stable code used in log lines.
    pub fn code(&self) -> &str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::Remote(err) => err.code.as_str(),
            Self::NotFound(_) => "not_found",
            Self::InvalidRow(_) => "invalid_row",
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "no authenticated user"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "row not found: {id}"),
            Self::InvalidRow(message) => write!(f, "invalid row from backend: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::NotAuthenticated | Self::NotFound(_) | Self::InvalidRow(_) => None,
        }
    }
}

impl From<BackendError> for SyncError {
    fn from(value: BackendError) -> Self {
        Self::Remote(value)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidRow(value.to_string())
    }
}
