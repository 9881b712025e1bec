//! Operator-facing scan outcomes.

use std::fmt;

use common::TicketId;
use domain::RedemptionError;
use ticket_store::Ticket;

pub const ACCEPTED: &str = "Access granted, have a good trip";
pub const ALREADY_USED: &str = "Ticket already used, generate a new ticket to enter";
pub const NOT_REGISTERED: &str = "Ticket not registered";
pub const NOT_ACTIVE: &str = "Ticket is not active yet";
pub const UNCONFIRMED: &str = "Could not confirm ticket state, please scan again";
pub const CONNECTION_ERROR: &str = "Connection error with the ticket store";
pub const UNREADABLE: &str = "Unreadable code";
pub const REJECTED: &str = "Ticket cannot be used";

/// Gate signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Accept,
    Deny,
}

/// What the scanner shows the operator after a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFeedback {
    pub signal: Signal,
    pub reason: &'static str,
    /// Absent when the code could not be parsed.
    pub ticket_id: Option<TicketId>,
    /// Whether another read of the same code would give the same answer.
    pub definitive: bool,
}

impl ScanFeedback {
    pub fn accepted(ticket: &Ticket) -> Self {
        Self {
            signal: Signal::Accept,
            reason: ACCEPTED,
            ticket_id: Some(ticket.id.clone()),
            definitive: true,
        }
    }

    pub fn unreadable() -> Self {
        Self {
            signal: Signal::Deny,
            reason: UNREADABLE,
            ticket_id: None,
            definitive: true,
        }
    }

    /// Maps a rejected redemption to a deny signal.
    pub fn denied(id: &TicketId, err: &RedemptionError) -> Self {
        let reason = match err {
            RedemptionError::AlreadyRedeemed(_) => ALREADY_USED,
            RedemptionError::NotFound(_) => NOT_REGISTERED,
            RedemptionError::NotActive { .. } => NOT_ACTIVE,
            RedemptionError::Contention { .. } => UNCONFIRMED,
            RedemptionError::Transport(_) => CONNECTION_ERROR,
            RedemptionError::InvalidTransition { .. }
            | RedemptionError::DuplicateId(_)
            | RedemptionError::InvalidInput(_) => REJECTED,
        };

        Self {
            signal: Signal::Deny,
            reason,
            ticket_id: Some(id.clone()),
            definitive: err.is_definitive(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.signal == Signal::Accept
    }
}

impl fmt::Display for ScanFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.signal {
            Signal::Accept => '✓',
            Signal::Deny => '✗',
        };
        write!(f, "{mark} {}", self.reason)?;
        if let Some(id) = &self.ticket_id {
            write!(f, " [{id}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ContentionCause;
    use ticket_store::TicketStatus;

    #[test]
    fn every_rejection_is_a_deny_with_its_reason() {
        let id = TicketId::new("T1");
        let cases = [
            (RedemptionError::AlreadyRedeemed(id.clone()), ALREADY_USED, true),
            (RedemptionError::NotFound(id.clone()), NOT_REGISTERED, true),
            (
                RedemptionError::NotActive {
                    id: id.clone(),
                    status: TicketStatus::Generated,
                },
                NOT_ACTIVE,
                true,
            ),
            (
                RedemptionError::Contention {
                    id: id.clone(),
                    cause: ContentionCause::RetriesExhausted { attempts: 5 },
                },
                UNCONFIRMED,
                false,
            ),
            (RedemptionError::Transport("down".into()), CONNECTION_ERROR, false),
        ];

        for (err, reason, definitive) in cases {
            let feedback = ScanFeedback::denied(&id, &err);
            assert_eq!(feedback.signal, Signal::Deny);
            assert_eq!(feedback.reason, reason);
            assert_eq!(feedback.definitive, definitive, "{err}");
        }
    }

    #[test]
    fn display_marks_signal() {
        let ticket = Ticket::new(TicketId::new("T1"), "Concert", "");
        assert_eq!(
            ScanFeedback::accepted(&ticket).to_string(),
            "✓ Access granted, have a good trip [T1]"
        );
        assert_eq!(ScanFeedback::unreadable().to_string(), "✗ Unreadable code");
    }
}
