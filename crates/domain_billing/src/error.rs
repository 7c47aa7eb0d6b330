//! Billing domain errors

use core_kernel::{MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the billing ledger
///
/// Business-rule violations (`Validation`, `IllegalTransition`) are expected
/// outcomes that callers translate into messages. `NotFound` and `Store`
/// indicate a broken caller contract or an unavailable store and abort the
/// surrounding unit of work.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed input rejected before any state change
    #[error("Validation error: {0}")]
    Validation(String),

    /// The entity's current status does not allow the requested action
    #[error("Cannot {action} {entity} in status {from}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    /// A referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// A concurrent writer claimed the same record
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The backing store failed
    #[error("Store error: {0}")]
    Store(PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn illegal_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        action: &'static str,
    ) -> Self {
        BillingError::IllegalTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true for expected rule violations that leave state untouched
    pub fn is_business_rule(&self) -> bool {
        matches!(self, BillingError::Validation(_) | BillingError::IllegalTransition { .. })
    }

    /// Returns true for faults that must propagate to the caller's boundary
    pub fn is_fatal(&self) -> bool {
        matches!(self, BillingError::NotFound { .. } | BillingError::Store(_))
    }
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                BillingError::NotFound { entity: entity_type, id }
            }
            PortError::Conflict { message } => BillingError::ConcurrencyConflict(message),
            PortError::Validation { message } => BillingError::Validation(message),
            other => BillingError::Store(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        BillingError::Validation(err.to_string())
    }
}
