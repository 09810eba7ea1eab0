use std::env;
use std::time::Duration;

use crate::error::{LlmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAiCompatible,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Builds a config from the environment. `LLM_PROVIDER_BASE_URL` is
    /// required; all other variables fall back to sensible defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("LLM_PROVIDER_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::InvalidEndpoint(base_url));
        }

        let provider = match env::var("LLM_PROVIDER").as_deref() {
            Ok("openai-compatible") => Provider::OpenAiCompatible,
            _ => Provider::Ollama,
        };

        let api_key = env::var("LLM_PROVIDER_API_KEY").ok().filter(|s| !s.is_empty());

        if provider == Provider::OpenAiCompatible && api_key.is_none() {
            return Err(LlmError::MissingApiKey("openai-compatible".to_string()));
        }

        let timeout_secs = env::var("LLM_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(LlmConfig { provider, base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout: Duration::from_secs(timeout_secs) })
    }
}
