//! Redemption error types.

use std::time::Duration;

use common::TicketId;
use thiserror::Error;
use ticket_store::{StoreError, TicketStatus};

/// Why a call ended without knowing the ticket's final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionCause {
    /// Every attempt lost a revision race.
    RetriesExhausted { attempts: u32 },

    /// The caller's deadline expired before the call resolved.
    DeadlineExpired { deadline: Duration },
}

impl std::fmt::Display for ContentionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentionCause::RetriesExhausted { attempts } => {
                write!(f, "{attempts} attempts lost a concurrent update")
            }
            ContentionCause::DeadlineExpired { deadline } => {
                write!(f, "deadline of {}ms expired", deadline.as_millis())
            }
        }
    }
}

/// Errors returned by the coordinator and the issuance service.
///
/// Revision conflicts are resolved inside the coordinator and have no
/// variant here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionError {
    /// No such ticket.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// The ticket was already consumed.
    #[error("Ticket {0} has already been redeemed")]
    AlreadyRedeemed(TicketId),

    /// The ticket exists but is not valid for entry yet.
    #[error("Ticket {id} is not active (status: {status})")]
    NotActive { id: TicketId, status: TicketStatus },

    /// The requested status change is not part of the lifecycle.
    #[error("Invalid transition for ticket {id}: {from} -> {to}")]
    InvalidTransition {
        id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    },

    /// The outcome is unknown to this caller; re-read the ticket.
    #[error("Outcome for ticket {id} is unresolved ({cause}); re-check ticket state")]
    Contention { id: TicketId, cause: ContentionCause },

    /// The generated id collided with an existing ticket.
    #[error("Ticket id already in use: {0}")]
    DuplicateId(TicketId),

    /// The request was rejected before reaching the store.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store could not be reached.
    #[error("Ticket store unavailable: {0}")]
    Transport(String),
}

impl RedemptionError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RedemptionError::NotFound(_) => "not_found",
            RedemptionError::AlreadyRedeemed(_) => "already_redeemed",
            RedemptionError::NotActive { .. } => "not_active",
            RedemptionError::InvalidTransition { .. } => "invalid_transition",
            RedemptionError::Contention { .. } => "contention",
            RedemptionError::DuplicateId(_) => "duplicate_id",
            RedemptionError::InvalidInput(_) => "invalid_input",
            RedemptionError::Transport(_) => "transport",
        }
    }

    /// Returns true if the outcome is settled by the ticket's stored state,
    /// so repeating the same call would give the same answer.
    pub fn is_definitive(&self) -> bool {
        !matches!(
            self,
            RedemptionError::Contention { .. } | RedemptionError::Transport(_)
        )
    }
}

impl From<StoreError> for RedemptionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RedemptionError::NotFound(id),
            StoreError::AlreadyExists(id) => RedemptionError::DuplicateId(id),
            StoreError::InvalidRecord(msg) => RedemptionError::InvalidInput(msg),
            // A conflict that reaches this conversion was not retried.
            StoreError::RevisionConflict { id, .. } => RedemptionError::Contention {
                id,
                cause: ContentionCause::RetriesExhausted { attempts: 1 },
            },
            e @ (StoreError::Transport(_) | StoreError::Migration(_)) => {
                RedemptionError::Transport(e.to_string())
            }
        }
    }
}

/// Convenience type alias for redemption results.
pub type Result<T> = std::result::Result<T, RedemptionError>;
