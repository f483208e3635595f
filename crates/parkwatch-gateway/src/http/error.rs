use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parkwatch_core::ParkError;
use parkwatch_protocol::ApiEnvelope;
use tracing::error;

/// Handler error: a [`ParkError`] rendered as a failed envelope.
#[derive(Debug)]
pub struct ApiError(pub ParkError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ParkError> for ApiError {
    fn from(e: ParkError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ParkError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ParkError::Validation(_) => StatusCode::BAD_REQUEST,
            ParkError::NotFound { .. } => StatusCode::NOT_FOUND,
            ParkError::Classifier(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = ApiEnvelope::err(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// Parse a path id, reporting a malformed one as a validation error.
pub fn parse_id(what: &str, raw: &str) -> ApiResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {what} ID")))
}
