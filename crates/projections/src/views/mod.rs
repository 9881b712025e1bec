//! Read model views built from the change feed.

pub mod redemption_log;
pub mod ticket_board;

pub use redemption_log::{RedemptionLogView, RedemptionRecord};
pub use ticket_board::{BoardEntry, BoardSummary, TicketBoardView};
