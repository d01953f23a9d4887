use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Fixed user-facing strings. Anything the provider reports is collapsed into
// one of these before it crosses the HTTP boundary; the raw cause only goes
// to the diagnostic log.
pub const LOGIN_FAILED: &str = "Login failed";
pub const LOGOUT_FAILED: &str = "Logout failed";
pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// AppError
///
/// The application-wide error taxonomy. Every fallible operation in the
/// repository, storage, provider, and upload layers resolves to one of these
/// variants; the `IntoResponse` impl below decides which curated message the
/// client sees.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field was missing or malformed. Enforced at the storage
    /// boundary, not by client UI state.
    #[error("{0}")]
    Validation(String),

    /// Generic authentication failure carrying one of the fixed strings above.
    #[error("{0}")]
    Auth(&'static str),

    /// A referenced document does not exist. Rendered as an inline message,
    /// never a redirect.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Compression or object storage failure. Aborts only the submission it
    /// belongs to.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A child deletion failed inside a cascade. The surrounding transaction
    /// is rolled back, so no partial state is left behind.
    #[error("cascade delete failed: {0}")]
    CascadeDelete(String),

    /// Identity provider call failed for a reason other than bad credentials.
    #[error("provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, (*msg).to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::Upload(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Upload failed".to_string()),
            AppError::CascadeDelete(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Delete failed".to_string())
            }
            AppError::Provider(_) | AppError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_ERROR.to_string())
            }
        };

        // Diagnostic channel gets the full error; the response body gets the
        // curated message only.
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
