use std::sync::Arc;
use std::time::Duration;

use common::{OperatorId, TicketId};
use domain::RedemptionCoordinator;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use ticket_store::TicketStore;
use tokio::time::Instant;

use crate::debounce::Debouncer;
use crate::feedback::ScanFeedback;

/// Extracts a ticket id from decoded text.
///
/// Surrounding whitespace is ignored. Empty text, or text with inner
/// whitespace, is not a ticket code.
pub fn parse_code(raw: &str) -> Option<TicketId> {
    let code = raw.trim();
    if code.is_empty() || code.chars().any(char::is_whitespace) {
        return None;
    }
    Some(TicketId::new(code))
}

/// One scanner's path from decoded text to gate feedback.
pub struct ScanPipeline<S: TicketStore> {
    coordinator: Arc<RedemptionCoordinator<S>>,
    operator: OperatorId,
    debouncer: Debouncer,
}

impl<S: TicketStore> ScanPipeline<S> {
    /// Creates a pipeline with the default cooldown.
    pub fn new(coordinator: Arc<RedemptionCoordinator<S>>, operator: OperatorId) -> Self {
        Self {
            coordinator,
            operator,
            debouncer: Debouncer::default(),
        }
    }

    pub fn with_cooldown(
        coordinator: Arc<RedemptionCoordinator<S>>,
        operator: OperatorId,
        cooldown: Duration,
    ) -> Self {
        Self {
            coordinator,
            operator,
            debouncer: Debouncer::new(cooldown),
        }
    }

    pub fn operator(&self) -> &OperatorId {
        &self.operator
    }

    /// Handles one decoded read.
    ///
    /// Returns `None` when the code was handled within the cooldown window.
    /// Unresolved outcomes (contention, transport) do not start a cooldown,
    /// so the next read of the same code is dispatched again.
    #[tracing::instrument(skip(self), fields(operator = %self.operator))]
    pub async fn handle(&mut self, raw: &str) -> Option<ScanFeedback> {
        let key = raw.trim();
        let now = Instant::now();

        if self.debouncer.is_suppressed(key, now) {
            metrics::counter!("scans_suppressed_total").increment(1);
            tracing::trace!("read suppressed by cooldown");
            return None;
        }

        let feedback = match parse_code(raw) {
            Some(id) => match self.coordinator.redeem(&id, &self.operator).await {
                Ok(ticket) => ScanFeedback::accepted(&ticket),
                Err(e) => ScanFeedback::denied(&id, &e),
            },
            None => ScanFeedback::unreadable(),
        };

        if feedback.definitive {
            self.debouncer.record(key, Instant::now());
        }

        let signal = if feedback.is_accepted() { "accept" } else { "deny" };
        metrics::counter!("scans_total", "signal" => signal).increment(1);
        tracing::info!(signal, reason = feedback.reason, "scan handled");

        Some(feedback)
    }

    /// Turns a stream of decoded reads into a stream of feedback, skipping
    /// suppressed reads.
    pub fn run<I>(self, decoded: I) -> impl Stream<Item = ScanFeedback>
    where
        I: Stream<Item = String> + Unpin,
    {
        stream::unfold((self, decoded), |(mut pipeline, mut decoded)| async move {
            while let Some(raw) = decoded.next().await {
                if let Some(feedback) = pipeline.handle(&raw).await {
                    return Some((feedback, (pipeline, decoded)));
                }
            }
            None
        })
    }
}
