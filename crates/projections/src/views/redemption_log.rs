//! Redemption log read model: who let which ticket in, and when.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OperatorId, TicketId};
use serde::Serialize;
use ticket_store::{ChangeEvent, TicketStatus};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// A single redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedemptionRecord {
    pub ticket_id: TicketId,
    pub name: String,
    pub used_by: OperatorId,
    pub used_at: DateTime<Utc>,
}

#[derive(Default)]
struct LogState {
    records: Vec<RedemptionRecord>,
    seen: HashSet<TicketId>,
}

/// Audit trail of redeemed tickets, one record per ticket.
#[derive(Clone, Default)]
pub struct RedemptionLogView {
    state: Arc<RwLock<LogState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl RedemptionLogView {
    pub fn new() -> Self {
        Self::default()
    }

    /// All redemptions, oldest first.
    pub async fn records(&self) -> Vec<RedemptionRecord> {
        let mut records = self.state.read().await.records.clone();
        records.sort_by(|a, b| a.used_at.cmp(&b.used_at).then(a.ticket_id.cmp(&b.ticket_id)));
        records
    }

    /// The `limit` most recent redemptions, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<RedemptionRecord> {
        let mut records = self.records().await;
        records.reverse();
        records.truncate(limit);
        records
    }

    pub async fn by_operator(&self, operator: &OperatorId) -> Vec<RedemptionRecord> {
        let mut records = self.records().await;
        records.retain(|r| &r.used_by == operator);
        records
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for RedemptionLogView {
    fn name(&self) -> &'static str {
        "RedemptionLogView"
    }

    async fn handle(&self, event: &ChangeEvent) -> Result<()> {
        let ticket = &event.ticket;
        let record = match (ticket.status, ticket.used_at, &ticket.used_by) {
            (TicketStatus::Used, Some(used_at), Some(used_by)) => Some(RedemptionRecord {
                ticket_id: ticket.id.clone(),
                name: ticket.name.clone(),
                used_by: used_by.clone(),
                used_at,
            }),
            _ => None,
        };

        let mut applied = false;
        if let Some(record) = record {
            let mut state = self.state.write().await;
            if state.seen.insert(record.ticket_id.clone()) {
                tracing::debug!(ticket_id = %record.ticket_id, used_by = %record.used_by, "redemption logged");
                state.records.push(record);
                applied = true;
            }
        }

        let mut pos = self.position.write().await;
        *pos = if applied { pos.applied() } else { pos.skipped() };
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = LogState::default();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
