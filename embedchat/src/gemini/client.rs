//! HTTP client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{GenerateError, ResponseSource};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-1.5-flash";

/// Client for the Gemini REST API.
///
/// No timeout is layered on top of reqwest's defaults; a hung upstream
/// call stalls only the request awaiting it.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at an alternate API root (used by tests to talk
    /// to a stub server).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, MODEL, self.api_key
        )
    }
}

#[async_trait]
impl ResponseSource for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = GenerateContentRequest::from_prompt(prompt);

        let response = self
            .http
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .map_or_else(
                    || format!("upstream returned {status}"),
                    |body| body.error.message,
                );
            return Err(classify(status, &message));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Other(e.to_string()))?;

        body.first_text()
            .ok_or_else(|| GenerateError::Other("upstream returned no candidates".to_string()))
    }
}

/// Map an upstream failure to a typed error kind.
///
/// Gemini reports key problems as 400s with an `API_KEY`-flavored
/// message, so the message is inspected alongside the status code.
fn classify(status: StatusCode, message: &str) -> GenerateError {
    if message.contains("API_KEY")
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return GenerateError::Auth;
    }
    if message.contains("quota")
        || message.contains("limit")
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return GenerateError::Overloaded;
    }
    GenerateError::Other(message.to_string())
}

// === Wire types ===

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
