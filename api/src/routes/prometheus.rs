use std::sync::Arc;

use axum::extract::{Json, State};
use prometheus_proxy::PrometheusEnvelope;
use serde::Deserialize;
use tracing::instrument;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRangeRequest {
    pub query: String,
    pub start: String,
    pub end: String,
    pub step: String,
}

#[derive(Debug, Deserialize)]
pub struct SeriesRequest {
    #[serde(rename = "match")]
    pub matchers: Vec<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelValuesRequest {
    pub label_name: String,
}

#[instrument(skip(state))]
pub async fn query(State(state): State<Arc<AppState>>, Json(req): Json<QueryRequest>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.query(&req.query, req.time.as_deref()).await)
}

#[instrument(skip(state))]
pub async fn query_range(State(state): State<Arc<AppState>>, Json(req): Json<QueryRangeRequest>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.query_range(&req.query, &req.start, &req.end, &req.step).await)
}

#[instrument(skip(state))]
pub async fn series(State(state): State<Arc<AppState>>, Json(req): Json<SeriesRequest>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.series(&req.matchers, req.start.as_deref(), req.end.as_deref()).await)
}

#[instrument(skip(state))]
pub async fn label_values_post(State(state): State<Arc<AppState>>, Json(req): Json<LabelValuesRequest>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.label_values(&req.label_name).await)
}

#[instrument(skip(state))]
pub async fn labels(State(state): State<Arc<AppState>>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.labels().await)
}

#[instrument(skip(state))]
pub async fn targets(State(state): State<Arc<AppState>>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.targets().await)
}

#[instrument(skip(state))]
pub async fn rules(State(state): State<Arc<AppState>>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.rules().await)
}

#[instrument(skip(state))]
pub async fn alerts(State(state): State<Arc<AppState>>) -> Json<PrometheusEnvelope> {
    Json(state.prometheus.alerts().await)
}
