use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ai_llm_service::LlmConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub llm: LlmConfig,
    pub prometheus_base_url: String,
    pub prometheus_timeout: Duration,
    pub fs_allowed_roots: Vec<PathBuf>,
    pub git_clone_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let llm = LlmConfig::from_env()?;

        let prometheus_base_url = env::var("PROMETHEUS_BASE_URL").unwrap_or_else(|_| "http://localhost:9090".to_string());
        let prometheus_timeout = Duration::from_secs(env_u64("PROMETHEUS_REQUEST_TIMEOUT_SECS", 10));

        let fs_allowed_roots = match env::var("FS_ALLOWED_ROOTS") {
            Ok(list) if !list.trim().is_empty() => list.split(',').map(|s| PathBuf::from(s.trim())).collect(),
            _ => vec![env::current_dir()?],
        };

        let git_clone_timeout = Duration::from_secs(env_u64("GIT_CLONE_TIMEOUT_SECS", 60));

        Ok(AppConfig { bind_addr, llm, prometheus_base_url, prometheus_timeout, fs_allowed_roots, git_clone_timeout })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
