use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a ticket.
///
/// The identifier is the exact text embedded in the printed scannable code,
/// so it is kept as a string rather than parsed into a UUID. Freshly issued
/// tickets use the hyphenated form of a random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Wraps an existing identifier, e.g. one decoded from a scanned code.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier begins with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TicketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TicketId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for TicketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the scanner or operator that redeemed a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    /// Creates an operator ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder used when the caller could not be identified.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
