use std::time::Duration;

use ai_llm_service::LlmClient;
use fs_gateway::Gateway;
use prometheus_proxy::PrometheusProxy;
use registry::ModelRegistry;

use crate::config::AppConfig;

/// Shared, read-only-after-boot application state. The registry is mutated
/// only during `build_registry` at startup, matching spec §4.1's
/// "registration happens only at startup" rule.
pub struct AppState {
    pub registry: ModelRegistry,
    pub llm: LlmClient,
    pub prometheus: PrometheusProxy,
    pub fs_gateway: Gateway,
    pub git_clone_timeout: Duration,
}

impl AppState {
    pub fn build(config: &AppConfig, registry: ModelRegistry) -> anyhow::Result<Self> {
        let llm = LlmClient::new(config.llm.clone())?;
        let prometheus = PrometheusProxy::new(config.prometheus_base_url.clone(), config.prometheus_timeout);
        let fs_gateway = Gateway::new(config.fs_allowed_roots.clone())?;

        Ok(AppState { registry, llm, prometheus, fs_gateway, git_clone_timeout: config.git_clone_timeout })
    }
}
