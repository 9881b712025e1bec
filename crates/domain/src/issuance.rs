//! Ticket issuance.

use common::TicketId;
use ticket_store::{Ticket, TicketStore};

use crate::error::{RedemptionError, Result};

/// Source of identifiers for new tickets.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> TicketId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> TicketId {
        TicketId::generate()
    }
}

/// A ticket to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub name: String,
    pub description: String,
}

impl IssueRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Creates tickets in the `generated` state.
///
/// Issuance never overwrites: an id collision is reported as `DuplicateId`
/// and leaves the existing ticket untouched.
pub struct IssuanceService<S: TicketStore, G: IdGenerator = UuidGenerator> {
    store: S,
    ids: G,
}

impl<S: TicketStore> IssuanceService<S> {
    /// Creates an issuance service generating UUID identifiers.
    pub fn new(store: S) -> Self {
        Self::with_generator(store, UuidGenerator)
    }
}

impl<S: TicketStore, G: IdGenerator> IssuanceService<S, G> {
    pub fn with_generator(store: S, ids: G) -> Self {
        Self { store, ids }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues a new ticket with a fresh id, `generated` status and revision 0.
    #[tracing::instrument(skip(self, description))]
    pub async fn issue(&self, name: &str, description: &str) -> Result<Ticket> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RedemptionError::InvalidInput(
                "ticket name must not be empty".to_string(),
            ));
        }

        let id = self.ids.next_id();
        let ticket = Ticket::new(id, name, description.trim());

        match self.store.create(ticket).await {
            Ok(ticket) => {
                metrics::counter!("tickets_issued_total").increment(1);
                tracing::info!(ticket_id = %ticket.id, "ticket issued");
                Ok(ticket)
            }
            Err(e) => {
                let err = RedemptionError::from(e);
                tracing::warn!(error = %err, "issuance failed");
                Err(err)
            }
        }
    }

    /// Issues several tickets in order, stopping at the first failure.
    pub async fn issue_batch<I>(&self, requests: I) -> Result<Vec<Ticket>>
    where
        I: IntoIterator<Item = IssueRequest>,
    {
        let mut issued = Vec::new();
        for request in requests {
            issued.push(self.issue(&request.name, &request.description).await?);
        }
        Ok(issued)
    }
}
