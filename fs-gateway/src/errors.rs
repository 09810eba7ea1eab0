use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("access to path '{0}' is not allowed")]
    PermissionDenied(String),
    #[error("path '{0}' does not exist")]
    NotFound(String),
    #[error("path '{0}' is not a directory")]
    NotADirectory(String),
    #[error("path '{0}' is a directory, not a file")]
    IsADirectory(String),
    #[error("destination '{0}' already exists")]
    AlreadyExists(String),
    #[error("file '{0}' is not valid UTF-8")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}
