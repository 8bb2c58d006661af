use revflow_core::StoreError;
use thiserror::Error;

/// Errors crossing collaborator boundaries inside revflow.
///
/// Action executors catch these and turn them into flagged results; only
/// storage failures during state detection end the orchestrator loop.
#[derive(Debug, Error)]
pub enum RevflowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("git worker thread has stopped")]
    GitWorkerGone,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context} failed with status {status}: {body}")]
    Remote {
        context: &'static str,
        status: u16,
        body: String,
    },

    #[error("agent error: {0}")]
    Agent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The operation needs a hosted pull request but revflow runs against
    /// local branches only (no PR number or no API token).
    #[error("no remote pull request configured: {0}")]
    LocalMode(&'static str),
}

impl RevflowError {
    /// True when the error is a stale comment reference from the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RevflowError::Store(StoreError::NotFound { .. }))
    }
}
