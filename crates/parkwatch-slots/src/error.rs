use parkwatch_core::ParkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot not found: {id}")]
    NotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("slot store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, SlotError>;

impl From<SlotError> for ParkError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::NotFound { id } => ParkError::not_found("slot", id),
            other => ParkError::Store(other.to_string()),
        }
    }
}
