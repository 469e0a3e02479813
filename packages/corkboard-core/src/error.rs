/// Error type shared by every storage-facing operation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Board already exists: {0}")]
    BoardExists(String),

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Refusing to delete {0}: it is the last remaining board")]
    LastBoard(String),

    #[error("Path is occupied by a folder: {0}")]
    OccupiedPath(String),

    #[error("No such file or folder: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
