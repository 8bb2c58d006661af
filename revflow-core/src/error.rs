use thiserror::Error;

/// Failures surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),

    /// No comment with `id` exists for `pr_key`. Callers treat this as a
    /// logic error (a stale comment reference), never as a soft miss.
    #[error("review comment {id} not found for {pr_key}")]
    NotFound { pr_key: String, id: String },
}
