//! Shared identifier types used across the ticket redemption crates.

pub mod types;

pub use types::{OperatorId, TicketId};
