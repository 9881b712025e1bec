//! Scanner configuration loaded from environment variables.

use std::time::Duration;

use common::OperatorId;
use domain::RedemptionConfig;

use crate::debounce::DEFAULT_COOLDOWN;

/// Scanner settings.
///
/// Reads from environment variables:
/// - `SCANNER_OPERATOR`: id recorded on redeemed tickets (default: `"scanner"`)
/// - `SCAN_COOLDOWN_MS`: per-code cooldown (default: `3000`)
/// - `DATABASE_URL`: PostgreSQL store; unset uses an in-memory store
/// - `REDEEM_MAX_ATTEMPTS`, `REDEEM_DEADLINE_MS`: see [`RedemptionConfig::from_env`]
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub operator: OperatorId,
    pub cooldown: Duration,
    pub database_url: Option<String>,
    pub redemption: RedemptionConfig,
}

impl ScannerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            operator: var("SCANNER_OPERATOR")
                .filter(|v| !v.trim().is_empty())
                .map(OperatorId::new)
                .unwrap_or_else(|| OperatorId::new("scanner")),
            cooldown: var("SCAN_COOLDOWN_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            database_url: var("DATABASE_URL").filter(|v| !v.is_empty()),
            redemption: RedemptionConfig::from_vars(&var),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            operator: OperatorId::new("scanner"),
            cooldown: DEFAULT_COOLDOWN,
            database_url: None,
            redemption: RedemptionConfig::default(),
        }
    }
}
