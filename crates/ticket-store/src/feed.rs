//! Push notifications of ticket mutations.
//!
//! The feed is a liveness optimization: subscribers that fall behind are told
//! to resynchronize from the store instead of being replayed what they missed.

use std::collections::HashMap;
use std::pin::Pin;

use futures_core::Stream;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{Revision, Ticket, TicketId, TicketStatus};

/// What kind of write produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// A committed ticket write, carrying the record as it was after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub ticket: Ticket,
}

impl ChangeEvent {
    /// Event for a newly created ticket.
    pub fn created(ticket: Ticket) -> Self {
        Self {
            kind: ChangeKind::Created,
            ticket,
        }
    }

    /// Event for a conditional update.
    pub fn updated(ticket: Ticket) -> Self {
        Self {
            kind: ChangeKind::Updated,
            ticket,
        }
    }

    pub fn id(&self) -> &TicketId {
        &self.ticket.id
    }

    pub fn status(&self) -> TicketStatus {
        self.ticket.status
    }

    pub fn revision(&self) -> Revision {
        self.ticket.revision
    }
}

/// Which tickets a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Every ticket.
    All,
    /// A single ticket.
    Key(TicketId),
    /// Tickets whose id starts with the given prefix.
    Prefix(String),
}

impl Subscription {
    /// Returns true if changes to `id` should be delivered.
    pub fn matches(&self, id: &TicketId) -> bool {
        match self {
            Subscription::All => true,
            Subscription::Key(key) => key == id,
            Subscription::Prefix(prefix) => id.has_prefix(prefix),
        }
    }
}

/// An item delivered to a feed subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNotice {
    /// A ticket changed.
    Changed(ChangeEvent),

    /// The subscriber fell behind and `missed` events were dropped.
    /// State must be re-read from the store.
    Resync { missed: u64 },
}

/// A stream of feed notices for one subscriber.
pub type ChangeStream = Pin<Box<dyn Stream<Item = FeedNotice> + Send>>;

/// Fan-out channel for ticket change events.
///
/// Cloning a feed yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Number of events buffered per subscriber before it lags.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a feed with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a feed buffering up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers reached. Having none is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!(
            ticket_id = %event.id(),
            status = %event.status(),
            revision = %event.revision(),
            "publishing ticket change"
        );
        metrics::counter!("ticket_feed_events_published").increment(1);
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribes to changes matching `filter`.
    ///
    /// Only events published after this call are delivered. For each ticket
    /// the stream yields strictly increasing revisions: an event at or below
    /// a revision already delivered is dropped.
    ///
    /// The stream remembers the last revision of every ticket it has
    /// delivered until the next [`FeedNotice::Resync`], which forgets them.
    pub fn subscribe(&self, filter: Subscription) -> ChangeStream {
        let state = SubscriberState {
            receiver: self.sender.subscribe(),
            filter,
            delivered: HashMap::new(),
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            let notice = state.next_notice().await?;
            Some((notice, state))
        }))
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

struct SubscriberState {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: Subscription,
    delivered: HashMap<TicketId, Revision>,
}

impl SubscriberState {
    async fn next_notice(&mut self) -> Option<FeedNotice> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if !self.filter.matches(event.id()) {
                        continue;
                    }
                    if !self.advance(&event) {
                        continue;
                    }
                    return Some(FeedNotice::Changed(event));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "change feed subscriber lagged, resync required");
                    // The subscriber re-reads the store, which supersedes every revision seen so far.
                    self.delivered.clear();
                    metrics::counter!("ticket_feed_resyncs").increment(1);
                    return Some(FeedNotice::Resync { missed });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Records the event's revision; false if it is not newer than the last one delivered.
    fn advance(&mut self, event: &ChangeEvent) -> bool {
        match self.delivered.get(event.id()) {
            Some(last) if *last >= event.revision() => false,
            _ => {
                self.delivered.insert(event.id().clone(), event.revision());
                true
            }
        }
    }
}
