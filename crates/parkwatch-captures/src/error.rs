use parkwatch_core::ParkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("image storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("capture store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, CaptureError>;

impl From<CaptureError> for ParkError {
    fn from(e: CaptureError) -> Self {
        ParkError::Store(e.to_string())
    }
}
