use crate::{Ticket, TicketStatus};

/// Builder for listing tickets.
///
/// Results are ordered by creation time, then by id.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    /// Filter by id prefix.
    pub prefix: Option<String>,

    /// Filter by status.
    pub status: Option<TicketStatus>,

    /// Maximum number of tickets to return.
    pub limit: Option<usize>,

    /// Number of tickets to skip.
    pub offset: Option<usize>,
}

impl TicketQuery {
    /// Creates a query matching every ticket.
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a query for ids beginning with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }

    /// Filters by id prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `ticket` passes the prefix and status filters.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(ref prefix) = self.prefix
            && !ticket.id.has_prefix(prefix)
        {
            return false;
        }
        if let Some(status) = self.status
            && ticket.status != status
        {
            return false;
        }
        true
    }
}
