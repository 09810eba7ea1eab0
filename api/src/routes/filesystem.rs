use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Json, State};
use fs_gateway::types::{EditOperation, EditResult, FileInfo, FsEntry, ReadManyEntry, WriteResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadManyRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub path: String,
    pub edits: Vec<EditOperation>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub src: String,
    pub dst: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub root: String,
    pub pattern: String,
    #[serde(default)]
    pub excludes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AllowedRootsResponse {
    pub roots: Vec<String>,
}

#[instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>, Json(req): Json<PathRequest>) -> AppResult<Json<Vec<FsEntry>>> {
    Ok(Json(state.fs_gateway.list(&req.path)?))
}

#[instrument(skip(state))]
pub async fn read(State(state): State<Arc<AppState>>, Json(req): Json<PathRequest>) -> AppResult<Json<ReadResponse>> {
    Ok(Json(ReadResponse { content: state.fs_gateway.read(&req.path)? }))
}

#[instrument(skip(state))]
pub async fn read_many(State(state): State<Arc<AppState>>, Json(req): Json<ReadManyRequest>) -> Json<BTreeMap<String, ReadManyEntry>> {
    Json(state.fs_gateway.read_many(&req.paths))
}

#[instrument(skip(state, req))]
pub async fn write(State(state): State<Arc<AppState>>, Json(req): Json<WriteRequest>) -> AppResult<Json<WriteResult>> {
    Ok(Json(state.fs_gateway.write(&req.path, &req.content)?))
}

#[instrument(skip(state, req))]
pub async fn edit(State(state): State<Arc<AppState>>, Json(req): Json<EditRequest>) -> AppResult<Json<EditResult>> {
    Ok(Json(state.fs_gateway.edit(&req.path, &req.edits, req.dry_run)?))
}

#[instrument(skip(state))]
pub async fn mkdir(State(state): State<Arc<AppState>>, Json(req): Json<PathRequest>) -> AppResult<Json<OkResponse>> {
    state.fs_gateway.mkdir(&req.path)?;
    Ok(Json(OkResponse { ok: true }))
}

#[instrument(skip(state))]
pub async fn move_path(State(state): State<Arc<AppState>>, Json(req): Json<MoveRequest>) -> AppResult<Json<OkResponse>> {
    state.fs_gateway.move_path(&req.src, &req.dst)?;
    Ok(Json(OkResponse { ok: true }))
}

#[instrument(skip(state))]
pub async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> AppResult<Json<SearchResponse>> {
    Ok(Json(SearchResponse { matches: state.fs_gateway.search(&req.root, &req.pattern, &req.excludes)? }))
}

#[instrument(skip(state))]
pub async fn info(State(state): State<Arc<AppState>>, Json(req): Json<PathRequest>) -> AppResult<Json<FileInfo>> {
    Ok(Json(state.fs_gateway.info(&req.path)?))
}

#[instrument(skip(state))]
pub async fn allowed_roots(State(state): State<Arc<AppState>>) -> Json<AllowedRootsResponse> {
    Json(AllowedRootsResponse { roots: state.fs_gateway.allowed_roots() })
}
