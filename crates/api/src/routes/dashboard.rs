//! Live dashboard served from the projection views.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use projections::{BoardEntry, BoardSummary, RedemptionRecord};
use serde::{Deserialize, Serialize};
use ticket_store::TicketStore;

use crate::AppState;

#[derive(Deserialize, Default)]
pub struct DashboardParams {
    /// How many recent redemptions to include (default: 20).
    pub recent: Option<usize>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub summary: BoardSummary,
    pub tickets: Vec<BoardEntry>,
    pub recent_redemptions: Vec<RedemptionRecord>,
}

/// GET /dashboard — every ticket's latest known state plus recent redemptions.
///
/// Reads the views only; they trail the store by the feed's delivery delay.
#[tracing::instrument(skip(state, params))]
pub async fn show<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<DashboardParams>,
) -> Json<DashboardResponse> {
    let recent = params.recent.unwrap_or(20);

    Json(DashboardResponse {
        summary: state.board.summary().await,
        tickets: state.board.entries().await,
        recent_redemptions: state.redemptions.recent(recent).await,
    })
}
