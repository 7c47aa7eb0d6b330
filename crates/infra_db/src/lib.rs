//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the school billing ledger, built on SQLx.
//!
//! # Architecture
//!
//! - [`repositories`]: row structs and SQL, one module per table group
//! - [`adapters`]: [`PostgresLedgerAdapter`], the `LedgerPort` implementation
//!   that runs every ledger operation inside one database transaction
//! - [`pool`]: connection pool configuration and embedded migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/school_billing")).await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresLedgerAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PgLedgerTx, PostgresLedgerAdapter};
