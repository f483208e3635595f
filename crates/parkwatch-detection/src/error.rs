use parkwatch_core::ParkError;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection refused or timed out.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("classifier API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    /// The service answered but reported `success: false`.
    #[error("classifier rejected frame")]
    Rejected,
}

impl From<ClassifierError> for ParkError {
    fn from(e: ClassifierError) -> Self {
        ParkError::Classifier(e.to_string())
    }
}
