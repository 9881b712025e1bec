//! Scan pipeline for entry gates.
//!
//! A scanner hands decoded text to [`ScanPipeline`], which debounces repeat
//! reads, asks the [`domain::RedemptionCoordinator`] to redeem the ticket and
//! turns the outcome into an accept or deny [`ScanFeedback`]. The pipeline
//! never writes to the store itself.

pub mod config;
pub mod debounce;
pub mod feedback;
pub mod pipeline;

pub use config::ScannerConfig;
pub use debounce::Debouncer;
pub use feedback::{ScanFeedback, Signal};
pub use pipeline::{ScanPipeline, parse_code};
