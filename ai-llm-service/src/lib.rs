//! Chat/completion forwarding to an external LLM provider.
//!
//! The broker treats the upstream as an opaque chat/completion client: it
//! forwards the request shape defined at the broker's HTTP boundary and
//! normalizes whatever the provider returns into that same shape. Two
//! provider families are supported: an OpenAI-compatible provider (whose
//! wire shape already matches the broker's, so responses pass through with
//! unknown fields kept verbatim) and Ollama's native API (whose shape is
//! adapted into the broker's envelope).

mod config;
mod error;
mod types;

pub use config::{LlmConfig, Provider};
pub use error::{LlmError, Result, make_snippet};
pub use types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, CompletionChoice, CompletionRequest,
    CompletionResponse, Usage,
};

use std::time::Instant;

use reqwest::header;
use serde::Deserialize;
use serde_json::{Map, json};
use tracing::{debug, error, instrument};

pub struct LlmClient {
    client: reqwest::Client,
    cfg: LlmConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
        if let Some(key) = &cfg.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()?;

        Ok(LlmClient { client, cfg })
    }

    #[instrument(skip(self, request), fields(model = %model_id, provider = ?self.cfg.provider))]
    pub async fn chat(&self, model_id: &str, request: ChatRequest) -> Result<ChatResponse> {
        let response = match self.cfg.provider {
            Provider::OpenAiCompatible => {
                let url = format!("{}/v1/chat/completions", self.cfg.base_url);
                let body = json!({
                    "model": model_id,
                    "messages": request.messages,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.post_json(&url, &body).await?
            }
            Provider::Ollama => {
                let url = format!("{}/api/chat", self.cfg.base_url);
                let body = json!({
                    "model": model_id,
                    "messages": request.messages,
                    "stream": false,
                    "options": {
                        "num_predict": request.max_tokens,
                        "temperature": request.temperature,
                    },
                });
                let raw: OllamaChatRaw = self.post_raw(&url, &body).await?;
                raw.into_chat_response(model_id)
            }
        };

        if response.choices.is_empty() {
            return Err(LlmError::EmptyChoices);
        }
        Ok(response)
    }

    #[instrument(skip(self, request), fields(model = %model_id, provider = ?self.cfg.provider))]
    pub async fn completion(&self, model_id: &str, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = match self.cfg.provider {
            Provider::OpenAiCompatible => {
                let url = format!("{}/v1/completions", self.cfg.base_url);
                let body = json!({
                    "model": model_id,
                    "prompt": request.prompt,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.post_json(&url, &body).await?
            }
            Provider::Ollama => {
                let url = format!("{}/api/generate", self.cfg.base_url);
                let body = json!({
                    "model": model_id,
                    "prompt": request.prompt,
                    "stream": false,
                    "options": {
                        "num_predict": request.max_tokens,
                        "temperature": request.temperature,
                    },
                });
                let raw: OllamaGenerateRaw = self.post_raw(&url, &body).await?;
                raw.into_completion_response(model_id)
            }
        };

        if response.choices.is_empty() {
            return Err(LlmError::EmptyChoices);
        }
        Ok(response)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, url: &str, body: &serde_json::Value) -> Result<T> {
        self.post_raw(url, body).await
    }

    async fn post_raw<T: for<'de> Deserialize<'de>>(&self, url: &str, body: &serde_json::Value) -> Result<T> {
        let started = Instant::now();
        debug!(%url, "POST upstream LLM request");

        let resp = self.client.post(url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, %url, %snippet, latency_ms = started.elapsed().as_millis(), "upstream LLM provider returned non-success status");
            return Err(LlmError::HttpStatus { status, url: url.to_string(), snippet });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let snippet = make_snippet(&text);
            error!(error = %e, %snippet, "failed to decode upstream LLM response");
            LlmError::Decode(format!("{e}: {snippet}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatRaw {
    #[serde(default)]
    created_at: Option<String>,
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl OllamaChatRaw {
    fn into_chat_response(self, model_id: &str) -> ChatResponse {
        let created = ollama_timestamp(self.created_at.as_deref());
        ChatResponse {
            id: format!("ollama-chat-{model_id}-{created}"),
            created,
            model: model_id.to_string(),
            choices: vec![ChatChoice {
                message: ChatMessage { role: self.message.role, content: self.message.content },
                index: 0,
                finish_reason: if self.done { "stop".to_string() } else { "length".to_string() },
            }],
            usage: Usage {
                prompt_tokens: self.prompt_eval_count,
                completion_tokens: self.eval_count,
                total_tokens: self.prompt_eval_count + self.eval_count,
            },
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateRaw {
    #[serde(default)]
    created_at: Option<String>,
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl OllamaGenerateRaw {
    fn into_completion_response(self, model_id: &str) -> CompletionResponse {
        let created = ollama_timestamp(self.created_at.as_deref());
        CompletionResponse {
            id: format!("ollama-completion-{model_id}-{created}"),
            created,
            model: model_id.to_string(),
            choices: vec![CompletionChoice {
                text: self.response,
                index: 0,
                finish_reason: if self.done { "stop".to_string() } else { "length".to_string() },
            }],
            usage: Usage {
                prompt_tokens: self.prompt_eval_count,
                completion_tokens: self.eval_count,
                total_tokens: self.prompt_eval_count + self.eval_count,
            },
            extra: Map::new(),
        }
    }
}

fn ollama_timestamp(created_at: Option<&str>) -> i64 {
    created_at.and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_chat_raw_maps_into_broker_shape() {
        let raw = OllamaChatRaw {
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            message: OllamaMessage { role: "assistant".to_string(), content: "hi".to_string() },
            done: true,
            prompt_eval_count: 3,
            eval_count: 5,
        };
        let resp = raw.into_chat_response("llama3");
        assert_eq!(resp.model, "llama3");
        assert_eq!(resp.choices[0].message.content, "hi");
        assert_eq!(resp.choices[0].finish_reason, "stop");
        assert_eq!(resp.usage.total_tokens, 8);
    }

    #[test]
    fn ollama_generate_raw_maps_into_broker_shape() {
        let raw = OllamaGenerateRaw {
            created_at: None,
            response: "completed text".to_string(),
            done: false,
            prompt_eval_count: 1,
            eval_count: 1,
        };
        let resp = raw.into_completion_response("llama3");
        assert_eq!(resp.choices[0].text, "completed text");
        assert_eq!(resp.choices[0].finish_reason, "length");
        assert_eq!(resp.created, 0);
    }

    #[test]
    fn make_snippet_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let snippet = make_snippet(&body);
        assert!(snippet.len() < body.len());
        assert!(snippet.ends_with("..."));
    }
}
