//! Application configuration loaded from environment variables.

use domain::RedemptionConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL store; unset uses an in-memory store
/// - `REDEEM_MAX_ATTEMPTS`, `REDEEM_DEADLINE_MS`: see [`RedemptionConfig::from_env`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub redemption: RedemptionConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `var`, which maps a variable name to its value.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            redemption: RedemptionConfig::from_vars(&var),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            redemption: RedemptionConfig::default(),
        }
    }
}
