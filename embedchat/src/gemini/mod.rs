//! Response Source: the generative-text backend behind the chat handler.
//!
//! The concrete backend is the Google Gemini REST API; when no API key
//! is configured the handler skips this module entirely and answers
//! from the canned fallback phrases.

mod client;
mod prompt;

pub use client::GeminiClient;
pub use prompt::{build_prompt, pick_fallback, FALLBACK_RESPONSES, HISTORY_WINDOW};

use async_trait::async_trait;

/// Failure kinds a generation attempt can surface.
///
/// Handlers branch on the kind, never on upstream error text; the
/// classification happens once, at this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The upstream rejected our credentials.
    #[error("upstream rejected the API key")]
    Auth,
    /// The upstream is out of quota or rate-limiting us.
    #[error("upstream quota or rate limit reached")]
    Overloaded,
    /// Transport failures, malformed responses, anything else.
    #[error("{0}")]
    Other(String),
}

/// A backend that turns a prompt into a reply.
#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
