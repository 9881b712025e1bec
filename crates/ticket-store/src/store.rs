use async_trait::async_trait;

use crate::{
    ChangeFeed, ChangeStream, Result, Revision, StoreError, Subscription, Ticket, TicketId,
    TicketMutation, TicketQuery,
};

/// Core trait for ticket store implementations.
///
/// [`conditional_update`](TicketStore::conditional_update) is the only way to
/// change an existing record. Every successful `create` or
/// `conditional_update` publishes exactly one event on the store's
/// [`ChangeFeed`] once the write is durable.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Reads the current record, failing with `NotFound` if absent.
    async fn get(&self, id: &TicketId) -> Result<Ticket>;

    /// Inserts a new record.
    ///
    /// Fails with `AlreadyExists` if the id is taken; never overwrites.
    async fn create(&self, ticket: Ticket) -> Result<Ticket>;

    /// Applies `mutation` only if the stored revision equals `expected`.
    ///
    /// On success the revision is incremented atomically with the write and
    /// the updated record is returned. A stale `expected` fails with
    /// `RevisionConflict` and leaves the record untouched.
    async fn conditional_update(
        &self,
        id: &TicketId,
        expected: Revision,
        mutation: TicketMutation,
    ) -> Result<Ticket>;

    /// Lists tickets matching `query`, ordered by creation time then id.
    async fn list(&self, query: TicketQuery) -> Result<Vec<Ticket>>;

    /// Returns the feed this store publishes its writes to.
    fn feed(&self) -> &ChangeFeed;

    /// Subscribes to changes of one ticket, an id prefix, or everything.
    fn subscribe(&self, filter: Subscription) -> ChangeStream {
        self.feed().subscribe(filter)
    }
}

/// Extension trait providing convenience methods for ticket stores.
#[async_trait]
pub trait TicketStoreExt: TicketStore {
    /// Reads a record, mapping `NotFound` to `None`.
    async fn find(&self, id: &TicketId) -> Result<Option<Ticket>> {
        match self.get(id).await {
            Ok(ticket) => Ok(Some(ticket)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// Blanket implementation for all TicketStore implementations
impl<T: TicketStore + ?Sized> TicketStoreExt for T {}

/// Validates a record before it is created.
pub fn validate_for_create(ticket: &Ticket) -> Result<()> {
    if ticket.revision != Revision::initial() {
        return Err(StoreError::InvalidRecord(format!(
            "new ticket {} must start at revision {}, got {}",
            ticket.id,
            Revision::initial(),
            ticket.revision
        )));
    }

    if ticket.id.as_str().is_empty() {
        return Err(StoreError::InvalidRecord(
            "ticket id must not be empty".to_string(),
        ));
    }

    ticket.check_invariants().map_err(StoreError::InvalidRecord)
}

/// Builds the record that results from applying `mutation` to `current`.
pub fn next_record(current: &Ticket, mutation: &TicketMutation) -> Ticket {
    let mut next = current.clone();
    mutation.apply(&mut next);
    next.revision = current.revision.next();
    next
}
