//! Billing Domain - School Billing and Payment Reconciliation Ledger
//!
//! This crate tracks what each student owes and what has been paid against
//! it, and matches bank statement lines back to recorded payments.
//!
//! # Payment paths
//!
//! A bill is paid through either of two paths, and both feed its balance:
//! - **Legacy payments**: one [`Payment`] per bill
//! - **Payment transactions**: one [`PaymentTransaction`] covering several
//!   bills, with a [`PaymentItem`] per bill
//!
//! Whether the legacy path is eventually retired is an open product
//! decision; until then both are first-class.
//!
//! # Derived state
//!
//! `Bill::amount_paid`, `Bill::status` and `PaymentTransaction::total_amount`
//! are never set by hand. [`LedgerService`] re-derives them inside the same
//! unit of work as the mutation that affects them.
//!
//! # Reconciliation
//!
//! An imported statement becomes a [`ReconciliationBatch`] of
//! [`ReconciliationLine`]s. The [`matcher`] pairs credit lines with verified
//! payments when exactly one candidate qualifies; the rest are resolved by
//! hand.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::LedgerService;
//!
//! let ledger = LedgerService::new(port, Currency::IDR);
//! let bill = ledger.create_bill(student, category, period, amount, due).await?;
//! let payment = ledger
//!     .record_legacy_payment(bill.id, amount, PaymentMethod::Cash, today, cashier)
//!     .await?;
//! ledger.verify_payment(payment.id, supervisor).await?;
//! ```

pub mod bill;
pub mod payment;
pub mod transaction;
pub mod recalculation;
pub mod reconciliation;
pub mod matcher;
pub mod numbering;
pub mod ports;
pub mod service;
pub mod error;

pub use bill::{Bill, BillStatus, BillingPeriod};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use transaction::{PaymentTransaction, PaymentItem, ItemContribution};
pub use recalculation::Recalculation;
pub use reconciliation::{
    ReconciliationBatch, ReconciliationLine, BatchStatus, BatchTotals, Direction, LineMatch,
    MatchType, StatementLineInput, StatementMetadata,
};
pub use matcher::{MatchingPolicy, CandidateScore, ProposedMatch};
pub use numbering::{DocumentKind, SequenceKey};
pub use ports::{LedgerPort, LedgerTx};
pub use service::LedgerService;
pub use error::BillingError;
