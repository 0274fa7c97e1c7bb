//! Error taxonomy for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Everything a chat-facing handler can fail with. Each variant carries
/// exactly what its JSON body needs; upstream error text never crosses
/// this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Missing or blank message text.
    #[error("message is required")]
    InvalidRequest,

    /// The client is over its request quota.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The AI backend rejected our credentials. Not retryable.
    #[error("AI service authentication failed")]
    AuthFailure,

    /// The AI backend is out of quota or rate-limiting us. Retryable.
    #[error("AI service temporarily busy")]
    Overloaded,

    /// Unclassified failure. Carries a fallback phrase so the caller
    /// always has displayable text.
    #[error("unexpected chat failure")]
    Unknown { fallback: String },

    /// No route matched.
    #[error("no route for {path}")]
    NotFound { path: String },
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Message is required" }),
            ),
            Self::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Too many requests. Please try again later.",
                    "retryAfter": retry_after_secs,
                }),
            ),
            Self::AuthFailure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "AI service authentication failed. Please contact support." }),
            ),
            Self::Overloaded => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "AI service is temporarily busy. Please try again in a moment." }),
            ),
            Self::Unknown { fallback } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Sorry, I encountered an issue. Please try again.",
                    "fallback": fallback,
                }),
            ),
            Self::NotFound { path } => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Endpoint not found", "path": path }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
