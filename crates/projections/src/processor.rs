//! Feed processor for keeping projections current.

use futures_util::StreamExt;
use ticket_store::{ChangeEvent, ChangeStream, FeedNotice, Revision, TicketQuery, TicketStore};

use crate::Result;
use crate::projection::Projection;

/// Delivers ticket changes to projections.
///
/// The processor supports:
/// - Catch-up: resets every projection and replays the store's current
///   tickets as synthetic events
/// - Single event delivery: delivers a new event to all projections
/// - Live delivery: consumes a feed subscription, catching up again whenever
///   the subscription reports that events were dropped
pub struct FeedProcessor<S: TicketStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: TicketStore> FeedProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Rebuilds every projection from the store's current contents.
    #[tracing::instrument(skip(self))]
    pub async fn catch_up(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }

        let tickets = self.store.list(TicketQuery::all()).await?;
        let replayed = tickets.len();

        for ticket in tickets {
            let event = if ticket.revision == Revision::initial() {
                ChangeEvent::created(ticket)
            } else {
                ChangeEvent::updated(ticket)
            };
            self.process(&event).await?;
        }

        metrics::counter!("projection_catch_ups_total").increment(1);
        tracing::info!(tickets = replayed, "catch-up complete");

        Ok(())
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(ticket_id = %event.id(), revision = %event.revision()))]
    pub async fn process(&self, event: &ChangeEvent) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
            metrics::counter!("projections_events_processed", "projection" => projection.name())
                .increment(1);
        }
        Ok(())
    }

    /// Applies notices from `changes` until the feed closes.
    ///
    /// Subscribe before calling [`catch_up`](Self::catch_up) so that no write
    /// falls between the two.
    pub async fn run(&self, mut changes: ChangeStream) -> Result<()> {
        while let Some(notice) = changes.next().await {
            match notice {
                FeedNotice::Changed(event) => self.process(&event).await?,
                FeedNotice::Resync { missed } => {
                    tracing::warn!(missed, "projections fell behind the feed, catching up");
                    self.catch_up().await?;
                }
            }
        }

        tracing::info!("change feed closed, projection processor stopping");
        Ok(())
    }
}
