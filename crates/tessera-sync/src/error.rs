//! Sync engine error types.
//!
//! Only structural problems are errors at the `run()` boundary; per-entity
//! failures (role conflicts, fetch errors, operation failures) travel as
//! data inside the run summary so one bad entity never aborts the rest.

use thiserror::Error;

use tessera_directory::DirectoryError;

/// Fatal errors for a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A run is already in progress on this engine; runs are serial.
    #[error("a synchronization run is already in progress")]
    AlreadyRunning,

    /// The directory model failed validation or resolution; desired state
    /// cannot be trusted, so nothing was written.
    #[error(transparent)]
    Hierarchy(#[from] DirectoryError),
}

/// Result type for sync engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
