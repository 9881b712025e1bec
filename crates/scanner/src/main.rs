//! Scanner entry point.
//!
//! Reads one decoded ticket code per line from stdin and prints the gate
//! feedback for each handled read. Logs go to stderr.

use std::sync::Arc;

use domain::RedemptionCoordinator;
use futures_util::{StreamExt, stream};
use scanner::{ScanPipeline, ScannerConfig};
use ticket_store::{InMemoryTicketStore, PostgresTicketStore, TicketStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

async fn scan<S: TicketStore>(store: S, config: ScannerConfig) {
    let coordinator = Arc::new(RedemptionCoordinator::with_config(
        store,
        config.redemption.clone(),
    ));
    let pipeline = ScanPipeline::with_cooldown(coordinator, config.operator.clone(), config.cooldown);

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let decoded = stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "failed to read from stdin");
                None
            }
        }
    });

    let mut feedback = Box::pin(pipeline.run(Box::pin(decoded)));
    while let Some(outcome) = feedback.next().await {
        println!("{outcome}");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ScannerConfig::from_env();
    tracing::info!(operator = %config.operator, cooldown_ms = config.cooldown.as_millis() as u64, "scanner ready");

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresTicketStore::connect(&url)
                .await
                .expect("failed to connect to the ticket store");
            scan(store, config).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, scanning against an empty in-memory store");
            scan(InMemoryTicketStore::new(), config).await;
        }
    }
}
