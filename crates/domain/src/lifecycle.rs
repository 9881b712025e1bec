//! Ticket lifecycle rules.
//!
//! Status only moves forward, one step at a time:
//!
//! ```text
//! generated ──activate──▶ active ──redeem──▶ used
//! ```

use common::{OperatorId, TicketId};
use ticket_store::{Ticket, TicketMutation, TicketStatus, timestamp_now};

use crate::error::{RedemptionError, Result};

/// Returns true if `from → to` is a single legal lifecycle step.
pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
    matches!(
        (from, to),
        (TicketStatus::Generated, TicketStatus::Active) | (TicketStatus::Active, TicketStatus::Used)
    )
}

/// A requested lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `generated → active`.
    Activate,

    /// `active → used`, recorded against the scanning operator.
    Redeem(OperatorId),
}

impl Transition {
    /// Maps a target status to the step that reaches it.
    ///
    /// Returns `None` for `Generated`, which no step leads to.
    pub fn toward(target: TicketStatus, operator: &OperatorId) -> Option<Self> {
        match target {
            TicketStatus::Generated => None,
            TicketStatus::Active => Some(Transition::Activate),
            TicketStatus::Used => Some(Transition::Redeem(operator.clone())),
        }
    }

    /// The status this step produces.
    pub fn target(&self) -> TicketStatus {
        match self {
            Transition::Activate => TicketStatus::Active,
            Transition::Redeem(_) => TicketStatus::Used,
        }
    }

    /// Metric and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Activate => "activate",
            Transition::Redeem(_) => "redeem",
        }
    }

    /// Checks that the ticket's current status allows this step.
    pub fn admit(&self, ticket: &Ticket) -> Result<()> {
        let target = self.target();
        if can_transition(ticket.status, target) {
            return Ok(());
        }

        let id = &ticket.id;
        Err(match (self, ticket.status) {
            (Transition::Redeem(_), TicketStatus::Used) => {
                RedemptionError::AlreadyRedeemed(id.clone())
            }
            (Transition::Redeem(_), status) => RedemptionError::NotActive {
                id: id.clone(),
                status,
            },
            (Transition::Activate, from) => invalid(id, from, target),
        })
    }

    /// Builds the store mutation for this step. Redemption is stamped now.
    pub fn mutation(&self) -> TicketMutation {
        match self {
            Transition::Activate => TicketMutation::Activate,
            Transition::Redeem(operator) => TicketMutation::Redeem {
                used_at: timestamp_now(),
                used_by: operator.clone(),
            },
        }
    }
}

pub(crate) fn invalid(id: &TicketId, from: TicketStatus, to: TicketStatus) -> RedemptionError {
    RedemptionError::InvalidTransition {
        id: id.clone(),
        from,
        to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_in(status: TicketStatus) -> Ticket {
        let mut ticket = Ticket::new(TicketId::new("T1"), "Concert", "Front row");
        if status != TicketStatus::Generated {
            TicketMutation::Activate.apply(&mut ticket);
        }
        if status == TicketStatus::Used {
            TicketMutation::redeem(OperatorId::new("gate-1")).apply(&mut ticket);
        }
        ticket
    }

    #[test]
    fn test_only_forward_single_steps_are_legal() {
        use TicketStatus::*;
        for from in TicketStatus::ALL {
            for to in TicketStatus::ALL {
                let expected = matches!((from, to), (Generated, Active) | (Active, Used));
                assert_eq!(can_transition(from, to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_redeem_admission() {
        let redeem = Transition::Redeem(OperatorId::new("gate-1"));

        assert!(redeem.admit(&ticket_in(TicketStatus::Active)).is_ok());
        assert!(matches!(
            redeem.admit(&ticket_in(TicketStatus::Used)),
            Err(RedemptionError::AlreadyRedeemed(_))
        ));
        assert!(matches!(
            redeem.admit(&ticket_in(TicketStatus::Generated)),
            Err(RedemptionError::NotActive {
                status: TicketStatus::Generated,
                ..
            })
        ));
    }

    #[test]
    fn test_activate_admission() {
        assert!(
            Transition::Activate
                .admit(&ticket_in(TicketStatus::Generated))
                .is_ok()
        );

        for from in [TicketStatus::Active, TicketStatus::Used] {
            assert_eq!(
                Transition::Activate.admit(&ticket_in(from)),
                Err(RedemptionError::InvalidTransition {
                    id: TicketId::new("T1"),
                    from,
                    to: TicketStatus::Active,
                })
            );
        }
    }

    #[test]
    fn test_toward_target() {
        let op = OperatorId::new("gate-1");
        assert_eq!(Transition::toward(TicketStatus::Generated, &op), None);
        assert_eq!(
            Transition::toward(TicketStatus::Active, &op),
            Some(Transition::Activate)
        );
        assert_eq!(
            Transition::toward(TicketStatus::Used, &op),
            Some(Transition::Redeem(op))
        );
    }

    #[test]
    fn test_redeem_mutation_records_operator() {
        let mutation = Transition::Redeem(OperatorId::new("gate-7")).mutation();
        match mutation {
            TicketMutation::Redeem { used_by, .. } => assert_eq!(used_by.as_str(), "gate-7"),
            other => panic!("unexpected mutation {other:?}"),
        }
        assert_eq!(Transition::Activate.target(), TicketStatus::Active);
    }
}
