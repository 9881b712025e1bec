//! Domain layer for ticket redemption.
//!
//! This crate provides:
//! - The ticket lifecycle rules (`generated → active → used`)
//! - [`RedemptionCoordinator`], the only writer of status changes, which turns
//!   concurrent redemption attempts into a single winner using the store's
//!   compare-and-set and a bounded, jittered retry loop
//! - [`IssuanceService`] for creating new tickets

pub mod coordinator;
pub mod error;
pub mod issuance;
pub mod lifecycle;
pub mod retry;

pub use coordinator::{RedemptionConfig, RedemptionCoordinator};
pub use error::{ContentionCause, RedemptionError, Result};
pub use issuance::{IdGenerator, IssuanceService, IssueRequest, UuidGenerator};
pub use lifecycle::Transition;
pub use retry::{RetryPolicy, RetryPolicyBuilder};
