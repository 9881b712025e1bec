//! Per-code cooldown for repeated reads.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Default window during which a code that was just handled is ignored.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Suppresses repeat dispatches of the same code within a cooldown window.
///
/// State is local to one scanner; two scanners never share a debouncer.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    handled: HashMap<String, Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            handled: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true if `code` is still cooling down at `now`.
    pub fn is_suppressed(&self, code: &str, now: Instant) -> bool {
        self.handled
            .get(code)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.cooldown)
    }

    /// Starts the cooldown for `code` at `now`, dropping expired entries.
    pub fn record(&mut self, code: &str, now: Instant) {
        let cooldown = self.cooldown;
        self.handled
            .retain(|_, at| now.saturating_duration_since(*at) < cooldown);
        self.handled.insert(code.to_string(), now);
    }

    /// Number of codes currently cooling down or not yet pruned.
    pub fn tracked(&self) -> usize {
        self.handled.len()
    }
}
