use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Unified error type for the dispatch surface. Every sub-crate error
/// converts into one of these via `From` at the boundary; the dispatcher
/// is the sole place that maps an error kind to an HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    CloneFailed(String),
    #[error("upstream returned {status}: {message}")]
    UpstreamError { status: u16, message: String },
    #[error("{0}")]
    Timeout(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::CloneFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            warn!(%status, error = %self, "request rejected");
        } else {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation { field: "body".to_string(), message: err.to_string() }
    }
}

impl From<registry::RegistryError> for AppError {
    fn from(err: registry::RegistryError) -> Self {
        match err {
            registry::RegistryError::NotFound(id) => AppError::NotFound(format!("model '{id}' is not registered")),
            registry::RegistryError::DuplicateId(id) => AppError::Internal(anyhow::anyhow!("duplicate model id '{id}' at runtime")),
        }
    }
}

impl From<repo_workspace::errors::WorkspaceError> for AppError {
    fn from(err: repo_workspace::errors::WorkspaceError) -> Self {
        use repo_workspace::errors::WorkspaceError as E;
        match err {
            E::RevisionNotFound(rev) => AppError::NotFound(format!("revision '{rev}' not found")),
            E::Git(e) => AppError::CloneFailed(e.to_string()),
            E::Io(e) => AppError::CloneFailed(format!("workspace I/O error: {e}")),
            E::Join(e) => AppError::Internal(anyhow::anyhow!("workspace task join error: {e}")),
        }
    }
}

impl From<diff_extractor::DiffError> for AppError {
    fn from(err: diff_extractor::DiffError) -> Self {
        use diff_extractor::DiffError as E;
        match err {
            E::Workspace(e) => e.into(),
            E::Git(e) => AppError::CloneFailed(e.to_string()),
            E::Join(e) => AppError::Internal(anyhow::anyhow!("diff task join error: {e}")),
        }
    }
}

impl From<fs_gateway::errors::FsError> for AppError {
    fn from(err: fs_gateway::errors::FsError) -> Self {
        use fs_gateway::errors::FsError as E;
        match err {
            E::PermissionDenied(p) => AppError::PermissionDenied(format!("path '{p}' is outside the sandbox")),
            E::NotFound(p) => AppError::NotFound(format!("path '{p}' does not exist")),
            E::NotADirectory(p) => AppError::Validation { field: "path".to_string(), message: format!("'{p}' is not a directory") },
            E::IsADirectory(p) => AppError::Validation { field: "path".to_string(), message: format!("'{p}' is a directory") },
            E::AlreadyExists(p) => AppError::Validation { field: "path".to_string(), message: format!("'{p}' already exists") },
            E::Decode(p) => AppError::Validation { field: "path".to_string(), message: format!("'{p}' is not valid UTF-8") },
            E::Pattern(e) => AppError::Validation { field: "pattern".to_string(), message: e.to_string() },
            E::Io(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<ai_llm_service::LlmError> for AppError {
    fn from(err: ai_llm_service::LlmError) -> Self {
        use ai_llm_service::LlmError as E;
        match err {
            E::HttpStatus { status, url, snippet } => {
                AppError::UpstreamError { status: status.as_u16(), message: format!("request to {url} failed: {snippet}") }
            }
            E::HttpTransport(e) if e.is_timeout() => AppError::Timeout(e.to_string()),
            E::HttpTransport(e) => AppError::UpstreamError { status: 502, message: e.to_string() },
            E::Decode(msg) => AppError::UpstreamError { status: 502, message: msg },
            E::EmptyChoices => AppError::UpstreamError { status: 502, message: "upstream returned no choices".to_string() },
            E::MissingApiKey(p) => AppError::Internal(anyhow::anyhow!("missing API key for provider '{p}'")),
            E::InvalidEndpoint(e) => AppError::Internal(anyhow::anyhow!("invalid LLM endpoint: {e}")),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout("operation exceeded its configured deadline".to_string())
    }
}
