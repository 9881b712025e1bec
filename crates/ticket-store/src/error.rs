use thiserror::Error;

use crate::{Revision, TicketId};

/// Errors that can occur when interacting with the ticket store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No ticket exists with this identifier.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// A ticket with this identifier already exists; creation never overwrites.
    #[error("Ticket already exists: {0}")]
    AlreadyExists(TicketId),

    /// The stored revision did not match the revision the caller expected.
    #[error("Revision conflict for ticket {id}: expected revision {expected}, found {actual}")]
    RevisionConflict {
        id: TicketId,
        expected: Revision,
        actual: Revision,
    },

    /// The record handed to the store breaks a ticket invariant.
    #[error("Invalid ticket record: {0}")]
    InvalidRecord(String),

    /// The backend could not be reached or failed to execute the operation.
    #[error("Transport error: {0}")]
    Transport(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ticket store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
