//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The ticket store could not be read during catch-up.
    #[error("Ticket store error: {0}")]
    Store(#[from] ticket_store::StoreError),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
