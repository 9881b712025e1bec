//! Durable ticket storage for the redemption core.
//!
//! - [`Ticket`] records versioned by a [`Revision`] counter
//! - [`TicketStore`] trait whose only mutation path is a compare-and-set
//!   [`TicketStore::conditional_update`]
//! - [`ChangeFeed`] delivering per-key ordered change notifications
//! - In-memory and PostgreSQL backends

pub mod error;
pub mod feed;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod ticket;

pub use common::{OperatorId, TicketId};
pub use error::{Result, StoreError};
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeStream, FeedNotice, Subscription};
pub use memory::InMemoryTicketStore;
pub use postgres::PostgresTicketStore;
pub use query::TicketQuery;
pub use store::{TicketStore, TicketStoreExt};
pub use ticket::{ParseStatusError, Revision, Ticket, TicketMutation, TicketStatus, timestamp_now};
