//! Integration tests: issuance and redemption → change feed → dashboard views.

use std::sync::Arc;
use std::time::Duration;

use common::OperatorId;
use domain::{IssuanceService, RedemptionCoordinator};
use projections::{BoardSummary, FeedProcessor, RedemptionLogView, TicketBoardView};
use ticket_store::{
    ChangeFeed, ChangeStream, InMemoryTicketStore, Subscription, TicketStatus, TicketStore,
};

/// Helper to set up services, processor and both views.
fn setup(
    store: InMemoryTicketStore,
) -> (
    IssuanceService<InMemoryTicketStore>,
    RedemptionCoordinator<InMemoryTicketStore>,
    FeedProcessor<InMemoryTicketStore>,
    TicketBoardView,
    RedemptionLogView,
) {
    let issuance = IssuanceService::new(store.clone());
    let coordinator = RedemptionCoordinator::new(store.clone());

    let board = TicketBoardView::new();
    let log = RedemptionLogView::new();

    let mut processor = FeedProcessor::new(store);
    processor.register(Box::new(board.clone()));
    processor.register(Box::new(log.clone()));

    (issuance, coordinator, processor, board, log)
}

/// Polls `check` until it holds or a second passes.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_catch_up_reflects_store_contents() {
    let store = InMemoryTicketStore::new();
    let (issuance, coordinator, processor, board, log) = setup(store);
    let operator = OperatorId::new("gate-1");

    let a = issuance.issue("A", "").await.unwrap();
    let b = issuance.issue("B", "").await.unwrap();
    issuance.issue("C", "").await.unwrap();
    coordinator.activate(&a.id).await.unwrap();
    coordinator.activate(&b.id).await.unwrap();
    coordinator.redeem(&b.id, &operator).await.unwrap();

    processor.catch_up().await.unwrap();

    assert_eq!(
        board.summary().await,
        BoardSummary {
            total: 3,
            generated: 1,
            active: 1,
            used: 1,
        }
    );
    let records = log.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ticket_id, b.id);
    assert_eq!(records[0].used_by, operator);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_feed_updates_dashboard() {
    let store = InMemoryTicketStore::new();
    let (issuance, coordinator, processor, board, log) = setup(store.clone());

    let changes = store.subscribe(Subscription::All);
    processor.catch_up().await.unwrap();
    let processor = Arc::new(processor);
    let runner = Arc::clone(&processor);
    tokio::spawn(async move { runner.run(changes).await });

    let ticket = issuance.issue("Concert", "Row D").await.unwrap();
    eventually(|| {
        let board = board.clone();
        let id = ticket.id.clone();
        async move { board.get(&id).await.is_some() }
    })
    .await;

    coordinator.activate(&ticket.id).await.unwrap();
    coordinator
        .redeem(&ticket.id, &OperatorId::new("gate-2"))
        .await
        .unwrap();

    eventually(|| {
        let log = log.clone();
        async move { log.len().await == 1 }
    })
    .await;

    let entry = board.get(&ticket.id).await.unwrap();
    assert_eq!(entry.status, TicketStatus::Used);
    assert_eq!(entry.used_by, Some(OperatorId::new("gate-2")));
}

#[tokio::test]
async fn test_lagging_subscriber_resyncs_from_store() {
    let store = InMemoryTicketStore::with_feed(ChangeFeed::with_capacity(2));
    let (issuance, _coordinator, processor, board, _log) = setup(store.clone());

    let changes = store.subscribe(Subscription::All);
    for n in 0..6 {
        issuance.issue(&format!("Ticket {n}"), "").await.unwrap();
    }
    drop(issuance);

    // Only two events fit in the buffer; the rest must come from catch-up.
    let bounded: ChangeStream = Box::pin(futures_util::StreamExt::take(changes, 3));
    processor.run(bounded).await.unwrap();

    assert_eq!(board.summary().await.total, 6);
    assert_eq!(board.summary().await.generated, 6);
}
