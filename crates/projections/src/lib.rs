//! Dashboard read models.
//!
//! This crate keeps in-memory views of the ticket store up to date from the
//! change feed:
//! - [`Projection`] trait for applying change events to a view
//! - [`FeedProcessor`] for catch-up from the store and live feed delivery
//! - [`TicketBoardView`], the dashboard's per-ticket status board
//! - [`RedemptionLogView`], an audit trail of redemptions

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::FeedProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{BoardEntry, BoardSummary, RedemptionLogView, RedemptionRecord, TicketBoardView};
