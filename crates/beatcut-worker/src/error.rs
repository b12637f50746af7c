//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] beatcut_store::StoreError),

    #[error("media error: {0}")]
    Media(#[from] beatcut_media::MediaError),

    #[error("transition error: {0}")]
    Transition(#[from] beatcut_models::TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Persistence failures leave the task at its prior persisted state;
    /// the next tick retries instead of marking the task failed.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            WorkerError::Store(beatcut_store::StoreError::Persistence { .. })
        )
    }
}
