use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lumen_memory::IngestError;
use lumen_reasoning::ReasoningError;

/// Errors surfaced to HTTP clients as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Rejected before any work was done.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ReasoningError> for ApiError {
    fn from(e: ReasoningError) -> Self {
        match e {
            ReasoningError::InvalidQuery(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(format!("Agent processing failed: {}", other)),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::EmptyDocument(_) | IngestError::NotText(_) => ApiError::Validation(e.to_string()),
            other => ApiError::Internal(format!("Document processing failed: {}", other)),
        }
    }
}
