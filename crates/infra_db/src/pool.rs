//! Ledger connection pool and schema migrations
//!
//! Every connection handed out by the pool carries a per-statement and a
//! lock-wait timeout, so a unit of work stuck behind a slow query or a row
//! lock fails and rolls back instead of holding its locks indefinitely.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Pool and session settings for the ledger database
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/school_billing")
///     .max_connections(20)
///     .statement_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    /// How long a unit of work waits for a free connection
    pub acquire_timeout: Duration,
    /// Server-side limit on a single statement; zero disables it
    pub statement_timeout: Duration,
    /// Server-side limit on waiting for a row lock; zero disables it
    pub lock_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            statement_timeout: Duration::from_secs(30),
            lock_timeout: Duration::from_secs(10),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Parses the URL and attaches the session timeouts
    pub fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let options = PgConnectOptions::from_str(&self.url).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Invalid database URL: {}", e))
        })?;

        Ok(options.options([
            ("statement_timeout", self.statement_timeout.as_millis()),
            ("lock_timeout", self.lock_timeout.as_millis()),
        ]))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/school_billing")
    }
}

/// Connects a pool with the configured limits
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` when the URL is malformed or the
/// server cannot be reached.
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let options = config.connect_options()?;
    info!(
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout.as_millis() as u64,
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        "Creating ledger database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Applies the embedded schema migrations
///
/// Migrations live in the workspace `migrations/` directory and are
/// compiled into the binary.
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_timeouts_are_sent_as_startup_options() {
        let config = DatabaseConfig::new("postgres://ledger@db.internal:5433/school_billing")
            .statement_timeout(Duration::from_millis(2500))
            .lock_timeout(Duration::from_secs(1));

        let options = config.connect_options().unwrap();
        assert_eq!(
            options.get_options(),
            Some("-c statement_timeout=2500 -c lock_timeout=1000")
        );
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("school_billing"));
    }

    #[test]
    fn test_zero_timeout_disables_the_limit() {
        let config = DatabaseConfig::default()
            .statement_timeout(Duration::ZERO)
            .lock_timeout(Duration::ZERO);

        let options = config.connect_options().unwrap();
        assert_eq!(options.get_options(), Some("-c statement_timeout=0 -c lock_timeout=0"));
    }

    #[test]
    fn test_malformed_url_is_a_connection_error() {
        let err = DatabaseConfig::new("not a url").connect_options().unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.url.ends_with("/school_billing"));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.lock_timeout, Duration::from_secs(10));
    }
}
