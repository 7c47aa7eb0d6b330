//! API configuration

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use core_kernel::{Currency, MoneyError};
use domain_billing::{BillingError, MatchingPolicy};
use infra_db::DatabaseConfig;

/// API configuration
///
/// Loaded from `API_*` environment variables; any missing key keeps its
/// default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    pub database_max_connections: u32,
    /// Per-statement limit in milliseconds; 0 disables it
    pub database_statement_timeout_ms: u64,
    /// Row lock wait limit in milliseconds; 0 disables it
    pub database_lock_timeout_ms: u64,
    /// Log level
    pub log_level: String,
    /// ISO code of the ledger currency
    pub currency: String,
    /// Auto-match date window in days
    pub match_date_window_days: u32,
    /// Auto-match confidence threshold
    pub match_threshold: Decimal,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/school_billing".to_string(),
            database_max_connections: 10,
            database_statement_timeout_ms: 30_000,
            database_lock_timeout_ms: 10_000,
            log_level: "info".to_string(),
            currency: "IDR".to_string(),
            match_date_window_days: 3,
            match_threshold: Decimal::new(70, 2),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Currency every bill and payment is kept in
    pub fn ledger_currency(&self) -> Result<Currency, MoneyError> {
        self.currency.parse()
    }

    /// Pool settings for the ledger database
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database_max_connections)
            .statement_timeout(Duration::from_millis(self.database_statement_timeout_ms))
            .lock_timeout(Duration::from_millis(self.database_lock_timeout_ms))
    }

    /// Matching policy with the configured window and threshold
    pub fn matching_policy(&self) -> Result<MatchingPolicy, BillingError> {
        MatchingPolicy::with_window_and_threshold(self.match_date_window_days, self.match_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_describe_rupiah_ledger() {
        let config = ApiConfig::default();
        assert_eq!(config.ledger_currency().unwrap(), Currency::IDR);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");

        let policy = config.matching_policy().unwrap();
        assert_eq!(policy.date_window_days, 3);
        assert_eq!(policy.threshold, dec!(0.70));
    }

    #[test]
    fn test_database_timeouts_reach_the_pool() {
        let config = ApiConfig {
            database_max_connections: 4,
            database_statement_timeout_ms: 1500,
            database_lock_timeout_ms: 0,
            ..ApiConfig::default()
        };
        let db = config.database_config();
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.statement_timeout, Duration::from_millis(1500));
        assert_eq!(db.lock_timeout, Duration::ZERO);
        assert_eq!(db.url, config.database_url);
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let config = ApiConfig {
            match_threshold: dec!(1.5),
            ..ApiConfig::default()
        };
        assert!(config.matching_policy().is_err());
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        let config = ApiConfig {
            currency: "XYZ".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.ledger_currency().is_err());
    }
}
