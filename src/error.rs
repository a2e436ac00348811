use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The write collides with a live record (version slot, mod name, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed its health check.
    #[error("database integrity check failed: {0}")]
    Integrity(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
