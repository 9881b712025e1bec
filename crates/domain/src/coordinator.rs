//! Redemption coordinator.
//!
//! The coordinator is the single authority for status changes. Every change
//! is a read followed by a compare-and-set on the ticket's revision; losing
//! the race re-reads and re-validates, so two scanners presenting the same
//! ticket can never both succeed.

use std::future::Future;
use std::time::Duration;

use common::{OperatorId, TicketId};
use ticket_store::{StoreError, Ticket, TicketStatus, TicketStore};

use crate::error::{ContentionCause, RedemptionError, Result};
use crate::lifecycle::{self, Transition};
use crate::retry::RetryPolicy;

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionConfig {
    /// Backoff applied to revision conflicts.
    pub retry: RetryPolicy,

    /// Upper bound on a whole call, retries included. `None` waits as long
    /// as the retry budget allows.
    pub deadline: Option<Duration>,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            deadline: Some(Duration::from_secs(2)),
        }
    }
}

impl RedemptionConfig {
    /// Loads settings from the environment, falling back to defaults.
    ///
    /// - `REDEEM_MAX_ATTEMPTS`: total attempts per call (default: `5`)
    /// - `REDEEM_DEADLINE_MS`: per-call deadline, `0` disables it (default: `2000`)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads settings through `var`, which maps a variable name to its value.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_attempts = var("REDEEM_MAX_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.retry.max_attempts);

        let deadline = match var("REDEEM_DEADLINE_MS").and_then(|v| v.parse::<u64>().ok()) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.deadline,
        };

        Self {
            retry: RetryPolicy::builder().max_attempts(max_attempts).build(),
            deadline,
        }
    }
}

/// Applies lifecycle transitions with at-most-once semantics.
pub struct RedemptionCoordinator<S: TicketStore> {
    store: S,
    config: RedemptionConfig,
}

impl<S: TicketStore> RedemptionCoordinator<S> {
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RedemptionConfig::default())
    }

    pub fn with_config(store: S, config: RedemptionConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RedemptionConfig {
        &self.config
    }

    /// Redeems an active ticket on behalf of `operator`.
    ///
    /// Exactly one concurrent caller for the same ticket receives the updated
    /// ticket. The others receive `AlreadyRedeemed` once they observe the
    /// winner's write, or `Contention` if they could not tell in time.
    #[tracing::instrument(skip(self, id, operator), fields(ticket_id = %id, operator = %operator))]
    pub async fn redeem(&self, id: &TicketId, operator: &OperatorId) -> Result<Ticket> {
        let transition = Transition::Redeem(operator.clone());
        let outcome = self.run(id, &transition, self.config.deadline).await;
        record_outcome(transition.as_str(), &outcome);
        outcome
    }

    /// Like [`redeem`](Self::redeem) with an explicit deadline for this call.
    #[tracing::instrument(skip(self, id, operator), fields(ticket_id = %id, operator = %operator))]
    pub async fn redeem_within(
        &self,
        id: &TicketId,
        operator: &OperatorId,
        deadline: Duration,
    ) -> Result<Ticket> {
        let transition = Transition::Redeem(operator.clone());
        let outcome = self.run(id, &transition, Some(deadline)).await;
        record_outcome(transition.as_str(), &outcome);
        outcome
    }

    /// Moves a freshly issued ticket to `active`.
    #[tracing::instrument(skip(self, id), fields(ticket_id = %id))]
    pub async fn activate(&self, id: &TicketId) -> Result<Ticket> {
        let transition = Transition::Activate;
        let outcome = self.run(id, &transition, self.config.deadline).await;
        record_outcome(transition.as_str(), &outcome);
        outcome
    }

    /// Moves a ticket to `target` if that is the next lifecycle step.
    ///
    /// Targeting `used` follows redemption rules. Targeting `generated` is
    /// never legal; the ticket is still read so that unknown ids report
    /// `NotFound`.
    #[tracing::instrument(skip(self, id, operator), fields(ticket_id = %id, operator = %operator))]
    pub async fn transition(
        &self,
        id: &TicketId,
        target: TicketStatus,
        operator: &OperatorId,
    ) -> Result<Ticket> {
        match Transition::toward(target, operator) {
            Some(transition) => {
                let outcome = self.run(id, &transition, self.config.deadline).await;
                record_outcome(transition.as_str(), &outcome);
                outcome
            }
            None => {
                let rejected = async {
                    let current = self.store.get(id).await?;
                    Err::<Ticket, RedemptionError>(lifecycle::invalid(id, current.status, target))
                };
                let outcome = match self.config.deadline {
                    Some(deadline) => with_deadline(id, deadline, rejected).await,
                    None => rejected.await,
                };
                record_outcome("rewind", &outcome);
                outcome
            }
        }
    }

    async fn run(
        &self,
        id: &TicketId,
        transition: &Transition,
        deadline: Option<Duration>,
    ) -> Result<Ticket> {
        match deadline {
            Some(deadline) => with_deadline(id, deadline, self.guarded(id, transition)).await,
            None => self.guarded(id, transition).await,
        }
    }

    async fn guarded(&self, id: &TicketId, transition: &Transition) -> Result<Ticket> {
        let mut attempts = 0;
        let outcome = self.attempt(id, transition, &mut attempts).await;
        metrics::histogram!("redemption_attempts", "transition" => transition.as_str())
            .record(f64::from(attempts));
        outcome
    }

    /// Read, validate, compare-and-set; retry on revision conflicts only.
    async fn attempt(
        &self,
        id: &TicketId,
        transition: &Transition,
        attempts: &mut u32,
    ) -> Result<Ticket> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);

        loop {
            *attempts += 1;
            let attempt = *attempts;

            let current = self.store.get(id).await?;
            transition.admit(&current)?;

            match self
                .store
                .conditional_update(id, current.revision, transition.mutation())
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        attempt,
                        status = %updated.status,
                        revision = %updated.revision,
                        "ticket transitioned"
                    );
                    return Ok(updated);
                }
                Err(StoreError::RevisionConflict {
                    expected, actual, ..
                }) => {
                    metrics::counter!("redemption_conflicts_total").increment(1);

                    if attempt >= max_attempts {
                        tracing::warn!(attempt, "retry budget exhausted");
                        return Err(RedemptionError::Contention {
                            id: id.clone(),
                            cause: ContentionCause::RetriesExhausted { attempts: attempt },
                        });
                    }

                    let delay = policy.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt,
                        %expected,
                        %actual,
                        delay_ms = delay.as_millis() as u64,
                        "revision conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn with_deadline<F>(id: &TicketId, deadline: Duration, attempt: F) -> Result<Ticket>
where
    F: Future<Output = Result<Ticket>>,
{
    match tokio::time::timeout(deadline, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "deadline expired");
            Err(RedemptionError::Contention {
                id: id.clone(),
                cause: ContentionCause::DeadlineExpired { deadline },
            })
        }
    }
}

fn record_outcome(transition: &'static str, outcome: &Result<Ticket>) {
    let label = match outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(
        "redemptions_total",
        "transition" => transition,
        "outcome" => label
    )
    .increment(1);

    if let Err(e) = outcome {
        tracing::info!(outcome = label, error = %e, "transition rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_store::{InMemoryTicketStore, Revision};

    async fn coordinator_with(
        id: &str,
        status: TicketStatus,
    ) -> RedemptionCoordinator<InMemoryTicketStore> {
        let store = InMemoryTicketStore::new();
        store
            .create(Ticket::new(TicketId::new(id), "Concert", "Row A"))
            .await
            .unwrap();
        let coordinator = RedemptionCoordinator::new(store);
        let id = TicketId::new(id);
        if status != TicketStatus::Generated {
            coordinator.activate(&id).await.unwrap();
        }
        if status == TicketStatus::Used {
            coordinator
                .redeem(&id, &OperatorId::new("gate-0"))
                .await
                .unwrap();
        }
        coordinator
    }

    #[test]
    fn config_from_vars() {
        let config = RedemptionConfig::from_vars(|key| match key {
            "REDEEM_MAX_ATTEMPTS" => Some("3".to_string()),
            "REDEEM_DEADLINE_MS" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.deadline, None);

        let defaults = RedemptionConfig::from_vars(|_| Some("garbage".to_string()));
        assert_eq!(defaults, RedemptionConfig::default());
    }

    #[tokio::test]
    async fn redeem_active_ticket() {
        let coordinator = coordinator_with("T1", TicketStatus::Active).await;
        let id = TicketId::new("T1");

        let ticket = coordinator
            .redeem(&id, &OperatorId::new("gate-1"))
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Used);
        assert_eq!(ticket.used_by, Some(OperatorId::new("gate-1")));
        assert!(ticket.used_at.is_some());
        assert_eq!(ticket.revision, Revision::new(2));
    }

    #[tokio::test]
    async fn second_redeem_is_already_redeemed() {
        let coordinator = coordinator_with("T1", TicketStatus::Used).await;
        let id = TicketId::new("T1");

        let result = coordinator.redeem(&id, &OperatorId::new("gate-2")).await;

        assert_eq!(result, Err(RedemptionError::AlreadyRedeemed(id.clone())));
        let stored = coordinator.store().get(&id).await.unwrap();
        assert_eq!(stored.used_by, Some(OperatorId::new("gate-0")));
    }

    #[tokio::test]
    async fn redeem_generated_ticket_is_not_active() {
        let coordinator = coordinator_with("T1", TicketStatus::Generated).await;
        let id = TicketId::new("T1");

        let result = coordinator.redeem(&id, &OperatorId::new("gate-1")).await;

        assert!(matches!(
            result,
            Err(RedemptionError::NotActive {
                status: TicketStatus::Generated,
                ..
            })
        ));
        let stored = coordinator.store().get(&id).await.unwrap();
        assert_eq!(stored.revision, Revision::initial());
    }

    #[tokio::test]
    async fn redeem_unknown_is_not_found() {
        let coordinator = RedemptionCoordinator::new(InMemoryTicketStore::new());
        let id = TicketId::new("ghost");

        let result = coordinator.redeem(&id, &OperatorId::new("gate-1")).await;

        assert_eq!(result, Err(RedemptionError::NotFound(id)));
        assert_eq!(coordinator.store().ticket_count().await, 0);
    }

    #[tokio::test]
    async fn activate_twice_is_invalid_transition() {
        let coordinator = coordinator_with("T1", TicketStatus::Active).await;
        let id = TicketId::new("T1");

        let result = coordinator.activate(&id).await;

        assert_eq!(
            result,
            Err(RedemptionError::InvalidTransition {
                id,
                from: TicketStatus::Active,
                to: TicketStatus::Active,
            })
        );
    }

    #[tokio::test]
    async fn transition_back_to_generated_is_rejected() {
        let coordinator = coordinator_with("T1", TicketStatus::Active).await;
        let op = OperatorId::new("admin");

        let result = coordinator
            .transition(&TicketId::new("T1"), TicketStatus::Generated, &op)
            .await;
        assert!(matches!(
            result,
            Err(RedemptionError::InvalidTransition {
                from: TicketStatus::Active,
                to: TicketStatus::Generated,
                ..
            })
        ));

        let missing = coordinator
            .transition(&TicketId::new("nope"), TicketStatus::Generated, &op)
            .await;
        assert!(matches!(missing, Err(RedemptionError::NotFound(_))));
    }

    #[tokio::test]
    async fn transition_walks_the_lifecycle() {
        let coordinator = coordinator_with("T1", TicketStatus::Generated).await;
        let id = TicketId::new("T1");
        let op = OperatorId::new("gate-1");

        let active = coordinator
            .transition(&id, TicketStatus::Active, &op)
            .await
            .unwrap();
        assert_eq!(active.status, TicketStatus::Active);

        let used = coordinator
            .transition(&id, TicketStatus::Used, &op)
            .await
            .unwrap();
        assert_eq!(used.status, TicketStatus::Used);
    }
}
