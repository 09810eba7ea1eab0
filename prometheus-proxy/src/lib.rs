//! C8: pass-through proxy to a Prometheus HTTP API. Every operation wraps
//! a single GET; on 2xx the upstream JSON body is returned verbatim, and
//! on network error/timeout/non-2xx the envelope shape is the same
//! `{status: "error", error, data: null}` across all operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusEnvelope {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: Option<Value>,
    /// Any top-level field Prometheus returns beyond `status`/`error`/`data`
    /// (e.g. `warnings`, `errorType`), kept so the body round-trips verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct PrometheusProxy {
    base_url: String,
    client: reqwest::Client,
}

impl PrometheusProxy {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|_| reqwest::Client::new());
        PrometheusProxy { base_url: base_url.into().trim_end_matches('/').to_string(), client }
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn query(&self, query_expr: &str, time: Option<&str>) -> PrometheusEnvelope {
        let mut params = vec![("query", query_expr.to_string())];
        if let Some(t) = time {
            params.push(("time", t.to_string()));
        }
        self.get("/api/v1/query", &params).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn query_range(&self, query_expr: &str, start: &str, end: &str, step: &str) -> PrometheusEnvelope {
        let params = vec![
            ("query", query_expr.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("step", step.to_string()),
        ];
        self.get("/api/v1/query_range", &params).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn series(&self, matchers: &[String], start: Option<&str>, end: Option<&str>) -> PrometheusEnvelope {
        let mut params: Vec<(&str, String)> = matchers.iter().map(|m| ("match[]", m.clone())).collect();
        if let Some(s) = start {
            params.push(("start", s.to_string()));
        }
        if let Some(e) = end {
            params.push(("end", e.to_string()));
        }
        self.get("/api/v1/series", &params).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn labels(&self) -> PrometheusEnvelope {
        self.get("/api/v1/labels", &[]).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn label_values(&self, label_name: &str) -> PrometheusEnvelope {
        self.get(&format!("/api/v1/label/{label_name}/values"), &[]).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn targets(&self) -> PrometheusEnvelope {
        self.get("/api/v1/targets", &[]).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn rules(&self) -> PrometheusEnvelope {
        self.get("/api/v1/rules", &[]).await
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn alerts(&self) -> PrometheusEnvelope {
        self.get("/api/v1/alerts", &[]).await
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> PrometheusEnvelope {
        let url = format!("{}{}", self.base_url, path);
        let result = self.client.get(&url).query(params).send().await;

        match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<PrometheusEnvelope>().await {
                Ok(envelope) => envelope,
                Err(e) => error_envelope(format!("invalid JSON from upstream: {e}")),
            },
            Ok(resp) => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                warn!(%status, "prometheus upstream returned non-2xx");
                error_envelope(format!("upstream returned {status}: {body_text}"))
            }
            Err(e) => {
                warn!(error = %e, "prometheus request failed");
                error_envelope(e.to_string())
            }
        }
    }
}

fn error_envelope(message: String) -> PrometheusEnvelope {
    PrometheusEnvelope { status: "error".to_string(), error: Some(message), data: None, extra: Map::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_has_null_data() {
        let env = error_envelope("boom".to_string());
        assert_eq!(env.status, "error");
        assert!(env.data.is_none());
        assert_eq!(env.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unreachable_base_url_yields_error_envelope_quickly() {
        let proxy = PrometheusProxy::new("http://127.0.0.1:1", Duration::from_secs(2));
        let env = proxy.query("up", None).await;
        assert_eq!(env.status, "error");
        assert!(env.data.is_none());
    }
}
