//! Error types for the PostgreSQL override store.

use overlay_storage::StorageError;

/// Errors specific to the PostgreSQL override store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A row could not be mapped to an override record.
    #[error("Invalid row: {message}")]
    InvalidRow { message: String },
}

impl PostgresError {
    /// Creates a new invalid row error.
    #[must_use]
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => match e {
                sqlx_core::error::Error::PoolTimedOut
                | sqlx_core::error::Error::PoolClosed
                | sqlx_core::error::Error::Io(_)
                | sqlx_core::error::Error::Tls(_) => StorageError::connection_error(e.to_string()),
                other => StorageError::query_error(other.to_string()),
            },
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::InvalidRow { message } => StorageError::invalid_record(message),
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
