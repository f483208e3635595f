use parkwatch_core::ParkError;
use thiserror::Error;

/// Errors that can occur during session persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist in the database.
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("session store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for ParkError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { id } => ParkError::not_found("session", id),
            other => ParkError::Store(other.to_string()),
        }
    }
}
