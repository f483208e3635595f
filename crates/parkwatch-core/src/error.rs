use thiserror::Error;

/// Request-level error taxonomy.
///
/// Subsystem crates keep their own error enums and convert into this one at
/// the boundary where a caller needs to be told what went wrong.
#[derive(Debug, Error)]
pub enum ParkError {
    /// Bad input to an entry/exit/update request. No state was changed.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Persistence failure. Nothing was written and nothing was broadcast.
    #[error("Store error: {0}")]
    Store(String),

    /// The detection service was unreachable or answered with garbage.
    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParkError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        ParkError::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Short error code string returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ParkError::Validation(_) => "VALIDATION_ERROR",
            ParkError::NotFound { .. } => "NOT_FOUND",
            ParkError::Store(_) => "STORE_ERROR",
            ParkError::Classifier(_) => "CLASSIFIER_ERROR",
            ParkError::Config(_) => "CONFIG_ERROR",
            ParkError::Serialization(_) => "SERIALIZATION_ERROR",
            ParkError::Io(_) => "IO_ERROR",
            ParkError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ParkError>;
