use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OperatorId, TicketId};

/// Version counter of a ticket record, used as the compare-and-set token.
///
/// A freshly created ticket is at revision 0; every successful mutation
/// advances it by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// Creates a revision from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the revision of a newly created ticket.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next revision.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw revision value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Revision> for i64 {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}

/// Lifecycle status of a ticket.
///
/// ```text
/// Generated ──► Active ──► Used
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Issued but not yet valid for entry.
    Generated,

    /// Valid for a single entry.
    Active,

    /// Redeemed (terminal state).
    Used,
}

impl TicketStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [TicketStatus; 3] = [
        TicketStatus::Generated,
        TicketStatus::Active,
        TicketStatus::Used,
    ];

    /// Returns the status name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Generated => "generated",
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, Error)]
#[error("Unknown ticket status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for TicketStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(TicketStatus::Generated),
            "active" => Ok(TicketStatus::Active),
            "used" => Ok(TicketStatus::Used),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A single-use entry ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Identifier embedded in the scannable code.
    pub id: TicketId,

    /// Display name.
    pub name: String,

    /// Free-text description.
    pub description: String,

    /// Current lifecycle status.
    pub status: TicketStatus,

    /// When the ticket was issued.
    pub created_at: DateTime<Utc>,

    /// When the ticket was redeemed. Present iff `status` is `Used`.
    pub used_at: Option<DateTime<Utc>>,

    /// Who redeemed the ticket. Present iff `status` is `Used`.
    pub used_by: Option<OperatorId>,

    /// Compare-and-set token, bumped on every mutation.
    pub revision: Revision,
}

impl Ticket {
    /// Creates a ticket in the `Generated` state at the initial revision.
    pub fn new(id: TicketId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            status: TicketStatus::Generated,
            created_at: timestamp_now(),
            used_at: None,
            used_by: None,
            revision: Revision::initial(),
        }
    }

    /// Checks that the redemption fields agree with the status.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let has_redemption = self.used_at.is_some() || self.used_by.is_some();
        let full_redemption = self.used_at.is_some() && self.used_by.is_some();

        match self.status {
            TicketStatus::Used if !full_redemption => Err(format!(
                "ticket {} is used but lacks used_at/used_by",
                self.id
            )),
            TicketStatus::Generated | TicketStatus::Active if has_redemption => Err(format!(
                "ticket {} is {} but carries redemption fields",
                self.id, self.status
            )),
            _ => Ok(()),
        }
    }
}

/// A change applied to a ticket by [`TicketStore::conditional_update`].
///
/// Mutations describe the new values only; the store owns the revision bump.
///
/// [`TicketStore::conditional_update`]: crate::TicketStore::conditional_update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketMutation {
    /// Marks the ticket as valid for entry.
    Activate,

    /// Consumes the ticket.
    Redeem {
        used_at: DateTime<Utc>,
        used_by: OperatorId,
    },
}

impl TicketMutation {
    /// Builds a redemption stamped with the current time.
    pub fn redeem(used_by: OperatorId) -> Self {
        TicketMutation::Redeem {
            used_at: timestamp_now(),
            used_by,
        }
    }

    /// Status the ticket holds after this mutation.
    pub fn target_status(&self) -> TicketStatus {
        match self {
            TicketMutation::Activate => TicketStatus::Active,
            TicketMutation::Redeem { .. } => TicketStatus::Used,
        }
    }

    /// Applies the field changes to `ticket`. Does not touch the revision.
    pub fn apply(&self, ticket: &mut Ticket) {
        match self {
            TicketMutation::Activate => {
                ticket.status = TicketStatus::Active;
            }
            TicketMutation::Redeem { used_at, used_by } => {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(*used_at);
                ticket.used_by = Some(used_by.clone());
            }
        }
    }
}

/// Current time at microsecond precision, the resolution PostgreSQL keeps.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
