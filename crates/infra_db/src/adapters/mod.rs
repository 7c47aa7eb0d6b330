//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting domain interfaces
//! to the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_billing::LedgerPort;
//!
//! let adapter = PostgresLedgerAdapter::new(pool);
//! let mut tx = adapter.begin().await?;
//! let bill = tx.get_bill(bill_id).await?;
//! ```

pub mod ledger;

pub use ledger::{PgLedgerTx, PostgresLedgerAdapter};
