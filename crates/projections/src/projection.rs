//! Core projection trait and position tracking.

use async_trait::async_trait;
use ticket_store::ChangeEvent;

use crate::Result;

/// Tracks how many change events a projection has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Events handled since the last reset, stale ones included.
    pub events_seen: u64,

    /// Events that changed the view.
    pub events_applied: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Records an event that changed the view.
    pub fn applied(&self) -> Self {
        Self {
            events_seen: self.events_seen + 1,
            events_applied: self.events_applied + 1,
        }
    }

    /// Records a duplicate or out-of-date event that was ignored.
    pub fn skipped(&self) -> Self {
        Self {
            events_seen: self.events_seen + 1,
            ..*self
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}/{} applied)",
            self.events_applied, self.events_seen
        )
    }
}

/// A view maintained from ticket change events.
///
/// Delivery is at-least-once, so `handle` must tolerate duplicates and
/// events older than what the view already holds.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Applies a single change event.
    async fn handle(&self, event: &ChangeEvent) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Clears the view before a full rebuild.
    async fn reset(&self) -> Result<()>;
}
