//! HTTP API for ticket issuance, redemption and the live dashboard.
//!
//! Provides REST endpoints over the redemption core, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{IssuanceService, RedemptionConfig, RedemptionCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{FeedProcessor, Projection, RedemptionLogView, TicketBoardView};
use ticket_store::{ChangeStream, Subscription, TicketStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: TicketStore> {
    pub store: S,
    pub issuance: IssuanceService<S>,
    pub coordinator: RedemptionCoordinator<S>,
    pub board: TicketBoardView,
    pub redemptions: RedemptionLogView,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: TicketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/tickets", post(routes::tickets::issue::<S>))
        .route("/tickets", get(routes::tickets::list::<S>))
        .route("/tickets/{id}", get(routes::tickets::get::<S>))
        .route("/tickets/{id}/activate", post(routes::tickets::activate::<S>))
        .route("/tickets/{id}/redeem", post(routes::tickets::redeem::<S>))
        .route("/dashboard", get(routes::dashboard::show::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state, a processor feeding its views, and the feed
/// subscription the processor should consume.
///
/// The subscription is opened before returning so that writes made between
/// catch-up and [`FeedProcessor::run`] still reach the views.
pub fn create_default_state<S: TicketStore + Clone + 'static>(
    store: S,
    redemption: RedemptionConfig,
) -> (Arc<AppState<S>>, Arc<FeedProcessor<S>>, ChangeStream) {
    let board = TicketBoardView::new();
    let redemptions = RedemptionLogView::new();

    let mut processor = FeedProcessor::new(store.clone());
    processor.register(Box::new(board.clone()) as Box<dyn Projection>);
    processor.register(Box::new(redemptions.clone()) as Box<dyn Projection>);
    let changes = store.subscribe(Subscription::All);

    let state = Arc::new(AppState {
        issuance: IssuanceService::new(store.clone()),
        coordinator: RedemptionCoordinator::with_config(store.clone(), redemption),
        store,
        board,
        redemptions,
    });

    (state, Arc::new(processor), changes)
}
