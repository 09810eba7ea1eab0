mod catalog;
mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

use config::AppConfig;
use state::AppState;

pub async fn start() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let registry = catalog::build_registry()?;
    let state = Arc::new(AppState::build(&config, registry)?);

    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/models", get(routes::models::list_models))
        .route("/v1/models/{id}", get(routes::models::get_model))
        .route("/v1/models/{id}/chat", post(routes::models::chat))
        .route("/v1/models/{id}/completion", post(routes::models::completion))
        .route("/v1/models/git-analyzer/diff", post(routes::git::diff_last_commit))
        .route("/v1/models/git-diff-analyzer/analyze", post(routes::git::analyze_diff))
        .route("/v1/models/git-diff-analyzer/analyze-requirements", post(routes::git::analyze_requirements))
        .route("/v1/git/analyze_comprehensive", post(routes::git::analyze_comprehensive))
        .route("/v1/models/filesystem/list", post(routes::filesystem::list))
        .route("/v1/models/filesystem/read", post(routes::filesystem::read))
        .route("/v1/models/filesystem/read-multiple", post(routes::filesystem::read_many))
        .route("/v1/models/filesystem/write", post(routes::filesystem::write))
        .route("/v1/models/filesystem/edit", post(routes::filesystem::edit))
        .route("/v1/models/filesystem/mkdir", post(routes::filesystem::mkdir))
        .route("/v1/models/filesystem/move", post(routes::filesystem::move_path))
        .route("/v1/models/filesystem/search", post(routes::filesystem::search))
        .route("/v1/models/filesystem/info", post(routes::filesystem::info))
        .route("/v1/models/filesystem/allowed-roots", get(routes::filesystem::allowed_roots))
        .route("/v1/models/prometheus/query", post(routes::prometheus::query))
        .route("/v1/models/prometheus/query_range", post(routes::prometheus::query_range))
        .route("/v1/models/prometheus/series", post(routes::prometheus::series))
        .route("/v1/models/prometheus/label_values", post(routes::prometheus::label_values_post))
        .route("/v1/models/prometheus/labels", get(routes::prometheus::labels))
        .route("/v1/models/prometheus/targets", get(routes::prometheus::targets))
        .route("/v1/models/prometheus/rules", get(routes::prometheus::rules))
        .route("/v1/models/prometheus/alerts", get(routes::prometheus::alerts))
        .with_state(state)
}
