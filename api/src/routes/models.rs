use std::sync::Arc;

use ai_llm_service::{ChatRequest, ChatResponse, CompletionRequest, CompletionResponse};
use axum::extract::{Json, Path, State};
use registry::{Capability, ModelDescriptor};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelDescriptor>> {
    Json(state.registry.list().into_iter().cloned().collect())
}

#[instrument(skip(state))]
pub async fn get_model(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AppResult<Json<ModelDescriptor>> {
    Ok(Json(state.registry.get(&id)?.clone()))
}

fn require_capability(state: &AppState, id: &str, cap: Capability) -> AppResult<()> {
    let model = state.registry.get(id)?;
    if !model.has_capability(cap) {
        return Err(AppError::NotFound(format!("model '{id}' does not support this operation")));
    }
    Ok(())
}

#[instrument(skip(state, req), fields(model = %id))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    require_capability(&state, &id, Capability::Chat)?;
    let resp = state.llm.chat(&id, req).await?;
    Ok(Json(resp))
}

#[instrument(skip(state, req), fields(model = %id))]
pub async fn completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompletionRequest>,
) -> AppResult<Json<CompletionResponse>> {
    require_capability(&state, &id, Capability::Completion)?;
    let resp = state.llm.completion(&id, req).await?;
    Ok(Json(resp))
}
