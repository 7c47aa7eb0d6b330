//! Repository implementations for the ledger tables
//!
//! Each module owns the SQL for one group of tables and maps rows to plain
//! row structs. Repositories never open transactions of their own: every
//! function takes the caller's connection, which is normally the inside of
//! a `sqlx::Transaction` held by the ledger adapter.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`), so the crate
//! builds without a live database.

pub mod bills;
pub mod payments;
pub mod transactions;
pub mod sequences;
pub mod reconciliation;

pub use bills::BillRow;
pub use payments::PaymentRow;
pub use transactions::{ItemRow, ItemWithStatusRow, TransactionRow};
pub use reconciliation::{BatchRow, LineRow};
