//! Ticket issuance, lookup and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OperatorId, TicketId};
use serde::Deserialize;
use ticket_store::{Ticket, TicketQuery, TicketStatus, TicketStore};

use crate::AppState;
use crate::error::ApiError;

/// Largest page `GET /tickets` returns.
pub const MAX_PAGE_SIZE: usize = 500;

// -- Request types --

#[derive(Deserialize)]
pub struct IssueTicketRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Default)]
pub struct RedeemRequest {
    /// Scanner or operator performing the redemption.
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> Result<TicketQuery, ApiError> {
        let mut query = TicketQuery::all().limit(self.limit.unwrap_or(100).min(MAX_PAGE_SIZE));

        if let Some(prefix) = self.prefix.filter(|p| !p.is_empty()) {
            query = query.prefix(prefix);
        }
        if let Some(status) = self.status {
            let status: TicketStatus = status
                .parse()
                .map_err(|e: ticket_store::ParseStatusError| ApiError::BadRequest(e.to_string()))?;
            query = query.status(status);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }

        Ok(query)
    }
}

// -- Handlers --

/// POST /tickets — issue a new ticket in the `generated` state.
#[tracing::instrument(skip(state, req))]
pub async fn issue<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<IssueTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let ticket = state.issuance.issue(&req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /tickets — list tickets, oldest first.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let query = params.into_query()?;
    let tickets = state.store.list(query).await?;
    Ok(Json(tickets))
}

/// GET /tickets/{id} — read a ticket straight from the store.
#[tracing::instrument(skip(state))]
pub async fn get<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.store.get(&TicketId::new(id)).await?;
    Ok(Json(ticket))
}

/// POST /tickets/{id}/activate — make a generated ticket valid for entry.
#[tracing::instrument(skip(state))]
pub async fn activate<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.coordinator.activate(&TicketId::new(id)).await?;
    Ok(Json(ticket))
}

/// POST /tickets/{id}/redeem — consume an active ticket.
///
/// The body is optional; without an operator the redemption is recorded
/// against [`OperatorId::unknown`].
#[tracing::instrument(skip(state, body))]
pub async fn redeem<S: TicketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Option<Json<RedeemRequest>>,
) -> Result<Json<Ticket>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let operator = req
        .operator
        .filter(|op| !op.trim().is_empty())
        .map(OperatorId::new)
        .unwrap_or_else(OperatorId::unknown);

    let ticket = state
        .coordinator
        .redeem(&TicketId::new(id), &operator)
        .await?;
    Ok(Json(ticket))
}
