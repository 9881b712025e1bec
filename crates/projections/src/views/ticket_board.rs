//! Ticket board read model: the latest known state of every ticket.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OperatorId, TicketId};
use serde::Serialize;
use ticket_store::{ChangeEvent, Revision, TicketStatus};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// One row on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub id: TicketId,
    pub name: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<OperatorId>,
    pub revision: Revision,
}

impl From<&ChangeEvent> for BoardEntry {
    fn from(event: &ChangeEvent) -> Self {
        let ticket = &event.ticket;
        Self {
            id: ticket.id.clone(),
            name: ticket.name.clone(),
            description: ticket.description.clone(),
            status: ticket.status,
            created_at: ticket.created_at,
            used_at: ticket.used_at,
            used_by: ticket.used_by.clone(),
            revision: ticket.revision,
        }
    }
}

/// Ticket counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub total: usize,
    pub generated: usize,
    pub active: usize,
    pub used: usize,
}

/// Read model of every ticket's latest known state.
///
/// An event replaces an entry only if it carries a newer revision, so
/// duplicates and late deliveries leave the board unchanged.
#[derive(Clone, Default)]
pub struct TicketBoardView {
    entries: Arc<RwLock<HashMap<TicketId, BoardEntry>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl TicketBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &TicketId) -> Option<BoardEntry> {
        self.entries.read().await.get(id).cloned()
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> Vec<BoardEntry> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        entries
    }

    pub async fn by_status(&self, status: TicketStatus) -> Vec<BoardEntry> {
        let mut entries = self.entries().await;
        entries.retain(|e| e.status == status);
        entries
    }

    pub async fn summary(&self) -> BoardSummary {
        let entries = self.entries.read().await;
        let mut summary = BoardSummary {
            total: entries.len(),
            ..BoardSummary::default()
        };
        for entry in entries.values() {
            match entry.status {
                TicketStatus::Generated => summary.generated += 1,
                TicketStatus::Active => summary.active += 1,
                TicketStatus::Used => summary.used += 1,
            }
        }
        summary
    }
}

#[async_trait]
impl Projection for TicketBoardView {
    fn name(&self) -> &'static str {
        "TicketBoardView"
    }

    async fn handle(&self, event: &ChangeEvent) -> Result<()> {
        let mut entries = self.entries.write().await;
        let newer = entries
            .get(event.id())
            .is_none_or(|current| event.revision() > current.revision);

        if newer {
            entries.insert(event.id().clone(), BoardEntry::from(event));
        }

        let mut pos = self.position.write().await;
        *pos = if newer { pos.applied() } else { pos.skipped() };
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
