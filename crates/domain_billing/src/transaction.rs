//! Payment transactions
//!
//! A payment transaction is one payer-submitted payment that may settle
//! several bills at once. Each bill it touches gets a [`PaymentItem`].
//!
//! An item never counts as payment on its own; only the parent
//! transaction's `verified` status makes its amount contribute to the bill.
//! `total_amount` mirrors the sum of the items and is recomputed after
//! every item mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillId, Currency, GuardianId, Money, PaymentItemId, PaymentTransactionId, StudentId, UserId,
};
use crate::error::BillingError;
use crate::payment::{validate_amount, PaymentMethod, PaymentStatus};

/// A payment event covering one or more bills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Unique identifier
    pub id: PaymentTransactionId,
    /// Transaction number (`TRX/YYYY/MM/NNNNN`)
    pub transaction_number: String,
    /// Guardian who paid
    pub payer_id: GuardianId,
    /// Sum of the items, derived
    pub total_amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Date the money was received
    pub paid_on: NaiveDate,
    /// Opaque reference into the proof-of-payment file store
    pub proof_reference: Option<String>,
    /// Status
    pub status: PaymentStatus,
    pub notes: Option<String>,
    /// Staff member who recorded the transaction
    pub recorded_by: UserId,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<UserId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Creates a pending transaction with no items
    pub fn new(
        transaction_number: String,
        payer_id: GuardianId,
        currency: Currency,
        method: PaymentMethod,
        paid_on: NaiveDate,
        proof_reference: Option<String>,
        recorded_by: UserId,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: PaymentTransactionId::new_v7(),
            transaction_number,
            payer_id,
            total_amount: Money::zero(currency),
            method,
            paid_on,
            proof_reference,
            status: PaymentStatus::Pending,
            notes: None,
            recorded_by,
            verified_by: None,
            verified_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the transaction currency
    pub fn currency(&self) -> Currency {
        self.total_amount.currency()
    }

    /// Fails unless items may still be added, changed or removed
    pub fn ensure_editable(&self, action: &'static str) -> Result<(), BillingError> {
        if self.status == PaymentStatus::Cancelled {
            return Err(BillingError::illegal_transition("transaction", self.status, action));
        }
        Ok(())
    }

    /// Recomputes `total_amount` from the current items
    ///
    /// Returns true if the total changed.
    pub fn recompute_total(&mut self, items: &[PaymentItem]) -> Result<bool, BillingError> {
        let total = Money::sum(items.iter().map(|item| &item.amount), self.currency())?;
        if total == self.total_amount {
            return Ok(false);
        }
        self.total_amount = total;
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Verifies a pending transaction
    pub fn verify(&mut self, verifier: UserId) -> Result<(), BillingError> {
        if !self.status.can_transition_to(PaymentStatus::Verified) {
            return Err(BillingError::illegal_transition("transaction", self.status, "verify"));
        }

        let now = Utc::now();
        self.status = PaymentStatus::Verified;
        self.verified_by = Some(verifier);
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancels a pending or verified transaction
    pub fn cancel(&mut self, reason: impl Into<String>, actor: UserId) -> Result<(), BillingError> {
        if !self.status.can_transition_to(PaymentStatus::Cancelled) {
            return Err(BillingError::illegal_transition("transaction", self.status, "cancel"));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(BillingError::validation("Cancellation reason is required"));
        }

        let now = Utc::now();
        self.status = PaymentStatus::Cancelled;
        self.cancelled_by = Some(actor);
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }
}

/// Allocation of part of a transaction to one bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentItem {
    /// Unique identifier
    pub id: PaymentItemId,
    /// Parent transaction
    pub transaction_id: PaymentTransactionId,
    /// Bill this allocation pays toward
    pub bill_id: BillId,
    /// Student the bill belongs to
    pub student_id: StudentId,
    /// Allocated amount
    pub amount: Money,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentItem {
    /// Creates an item, validating that the amount is positive
    pub fn new(
        transaction_id: PaymentTransactionId,
        bill_id: BillId,
        student_id: StudentId,
        amount: Money,
    ) -> Result<Self, BillingError> {
        validate_amount(&amount)?;
        let now = Utc::now();

        Ok(Self {
            id: PaymentItemId::new_v7(),
            transaction_id,
            bill_id,
            student_id,
            amount,
            created_at: now,
            updated_at: now,
        })
    }

    /// Changes the allocated amount
    pub fn set_amount(&mut self, amount: Money) -> Result<(), BillingError> {
        validate_amount(&amount)?;
        if amount.currency() != self.amount.currency() {
            return Err(BillingError::validation("Item currency cannot change"));
        }
        self.amount = amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// An item together with its parent transaction's status
///
/// This is what the recalculation engine reads for a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContribution {
    pub item: PaymentItem,
    pub transaction_status: PaymentStatus,
}

impl ItemContribution {
    /// Returns true if the item currently counts toward its bill
    pub fn contributes(&self) -> bool {
        self.transaction_status.is_verified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transaction() -> PaymentTransaction {
        PaymentTransaction::new(
            "TRX/2025/01/00001".to_string(),
            GuardianId::new(),
            Currency::IDR,
            PaymentMethod::BankTransfer,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            None,
            UserId::new(),
        )
    }

    fn item(trx: &PaymentTransaction, amount: rust_decimal::Decimal) -> PaymentItem {
        let amount = Money::new(amount, Currency::IDR);
        PaymentItem::new(trx.id, BillId::new(), StudentId::new(), amount).unwrap()
    }

    #[test]
    fn test_new_transaction_is_pending_with_zero_total() {
        let trx = transaction();
        assert_eq!(trx.status, PaymentStatus::Pending);
        assert!(trx.total_amount.is_zero());
    }

    #[test]
    fn test_total_follows_items() {
        let mut trx = transaction();
        let mut items = vec![item(&trx, dec!(150000)), item(&trx, dec!(150000))];
        assert!(trx.recompute_total(&items).unwrap());
        assert_eq!(trx.total_amount.amount(), dec!(300000));

        items.remove(0);
        trx.recompute_total(&items).unwrap();
        assert_eq!(trx.total_amount.amount(), dec!(150000));

        assert!(!trx.recompute_total(&items).unwrap());
    }

    #[test]
    fn test_cancelled_transaction_rejects_edits() {
        let mut trx = transaction();
        trx.cancel("payer withdrew", UserId::new()).unwrap();
        assert!(trx.ensure_editable("add item to").is_err());
        assert!(trx.verify(UserId::new()).is_err());
    }

    #[test]
    fn test_verified_transaction_stays_editable() {
        let mut trx = transaction();
        trx.verify(UserId::new()).unwrap();
        assert!(trx.ensure_editable("add item to").is_ok());
        assert!(trx.verify(UserId::new()).is_err());
    }

    #[test]
    fn test_item_rejects_zero_amount() {
        let trx = transaction();
        let zero = Money::zero(Currency::IDR);
        let result = PaymentItem::new(trx.id, BillId::new(), StudentId::new(), zero);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }
}
