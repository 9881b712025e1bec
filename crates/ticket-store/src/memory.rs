use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    ChangeEvent, ChangeFeed, Result, Revision, StoreError, Ticket, TicketId, TicketMutation,
    TicketQuery,
    store::{TicketStore, next_record, validate_for_create},
};

/// In-memory ticket store.
///
/// Provides the same interface and compare-and-set semantics as the
/// PostgreSQL implementation. Writes and their change events happen under
/// one lock, so events for a ticket are published in revision order.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
    feed: ChangeFeed,
}

impl InMemoryTicketStore {
    /// Creates a new empty store with its own change feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store publishing to an existing feed.
    pub fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            tickets: Arc::default(),
            feed,
        }
    }

    /// Returns the number of stored tickets.
    pub async fn ticket_count(&self) -> usize {
        self.tickets.read().await.len()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: &TicketId) -> Result<Ticket> {
        self.tickets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn create(&self, ticket: Ticket) -> Result<Ticket> {
        validate_for_create(&ticket)?;

        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::AlreadyExists(ticket.id));
        }

        tickets.insert(ticket.id.clone(), ticket.clone());
        self.feed.publish(ChangeEvent::created(ticket.clone()));

        Ok(ticket)
    }

    async fn conditional_update(
        &self,
        id: &TicketId,
        expected: Revision,
        mutation: TicketMutation,
    ) -> Result<Ticket> {
        let mut tickets = self.tickets.write().await;
        let current = tickets
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if current.revision != expected {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                expected,
                actual: current.revision,
            });
        }

        let next = next_record(current, &mutation);
        *current = next.clone();
        self.feed.publish(ChangeEvent::updated(next.clone()));

        Ok(next)
    }

    async fn list(&self, query: TicketQuery) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        let mut matching: Vec<_> = tickets
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();

        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let matching = matching.into_iter().skip(offset);

        let matching = if let Some(limit) = query.limit {
            matching.take(limit).collect()
        } else {
            matching.collect()
        };

        Ok(matching)
    }

    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}
