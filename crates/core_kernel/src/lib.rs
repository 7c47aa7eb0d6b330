//! Core Kernel - Foundational types for the school billing ledger
//!
//! This crate provides the building blocks shared by every other crate:
//! - Money types with precise decimal arithmetic and presentation formatting
//! - Strongly-typed identifiers
//! - Port infrastructure for the hexagonal adapters

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    StudentId, GuardianId, FeeCategoryId, AcademicYearId, UserId,
    BillId, PaymentId, PaymentTransactionId, PaymentItemId,
    ReconciliationBatchId, ReconciliationLineId,
};
pub use error::CoreError;
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable};
