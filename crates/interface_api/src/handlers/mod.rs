//! Request handlers, one module per ledger area
//!
//! Handlers are generic over the ledger port so that the same router runs
//! on PostgreSQL in production and on the in-memory mock in tests.

pub mod bills;
pub mod payments;
pub mod transactions;
pub mod reconciliation;
pub mod health;
