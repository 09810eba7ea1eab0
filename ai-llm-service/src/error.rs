use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM_PROVIDER_API_KEY is required for provider '{0}'")]
    MissingApiKey(String),
    #[error("invalid LLM_PROVIDER_BASE_URL '{0}': must start with http:// or https://")]
    InvalidEndpoint(String),
    #[error("request to upstream LLM provider failed: {0}")]
    HttpTransport(#[from] reqwest::Error),
    #[error("upstream provider returned {status} for {url}: {snippet}")]
    HttpStatus { status: StatusCode, url: String, snippet: String },
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
    #[error("upstream response contained no choices")]
    EmptyChoices,
}

/// Truncates a response body to a bounded length for error messages and logs.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let boundary = (0..=MAX).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &body[..boundary])
    }
}
