//! Legacy single-bill payments
//!
//! A `Payment` is tied to exactly one bill. Newer code paths record
//! payments as a [`PaymentTransaction`](crate::transaction::PaymentTransaction)
//! with one item per bill; both are read by the recalculation engine.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, Money, PaymentId, StudentId, UserId};
use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the school cashier
    Cash,
    /// Bank transfer
    BankTransfer,
    /// Bank virtual account
    VirtualAccount,
    /// QRIS code
    Qris,
    /// Digital wallet
    EWallet,
}

/// Status shared by legacy payments and payment transactions
///
/// `pending → verified`, `pending → cancelled` and `verified → cancelled`
/// are the only legal moves. `cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded, awaiting verification
    Pending,
    /// Confirmed by staff; counts toward bills
    Verified,
    /// Voided
    Cancelled,
}

impl PaymentStatus {
    /// Checks whether moving to `target` is allowed
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, target),
            (Pending, Verified) | (Pending, Cancelled) | (Verified, Cancelled)
        )
    }

    pub fn is_verified(&self) -> bool {
        *self == PaymentStatus::Verified
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment against a single bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Receipt number (`KWT/YYYY/MM/NNNNN`)
    pub receipt_number: String,
    /// Bill being paid
    pub bill_id: BillId,
    /// Student the bill belongs to
    pub student_id: StudentId,
    /// Amount paid
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Date the money was received
    pub paid_on: NaiveDate,
    /// Status
    pub status: PaymentStatus,
    /// Free-form cashier notes
    pub notes: Option<String>,
    /// Cashier who recorded the payment
    pub recorded_by: UserId,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<UserId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment
    ///
    /// The receipt number is allocated by the caller from the monthly
    /// sequence; see [`crate::numbering`].
    pub fn new(
        receipt_number: String,
        bill_id: BillId,
        student_id: StudentId,
        amount: Money,
        method: PaymentMethod,
        paid_on: NaiveDate,
        recorded_by: UserId,
    ) -> Result<Self, BillingError> {
        validate_amount(&amount)?;

        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new_v7(),
            receipt_number,
            bill_id,
            student_id,
            amount,
            method,
            paid_on,
            status: PaymentStatus::Pending,
            notes: None,
            recorded_by,
            verified_by: None,
            verified_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attaches cashier notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Returns true if this payment currently counts toward its bill
    pub fn contributes(&self) -> bool {
        self.status.is_verified() && self.deleted_at.is_none()
    }

    /// Verifies a pending payment
    pub fn verify(&mut self, verifier: UserId) -> Result<(), BillingError> {
        self.ensure_transition(PaymentStatus::Verified, "verify")?;

        let now = Utc::now();
        self.status = PaymentStatus::Verified;
        self.verified_by = Some(verifier);
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancels a pending or verified payment
    pub fn cancel(&mut self, reason: impl Into<String>, actor: UserId) -> Result<(), BillingError> {
        self.ensure_transition(PaymentStatus::Cancelled, "cancel")?;
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

    /// Changes the amount, method or date of a payment still pending
    ///
    /// The date may move within its month only, since the receipt number
    /// carries the month it was issued in.
    pub fn amend(
        &mut self,
        amount: Money,
        method: PaymentMethod,
        paid_on: NaiveDate,
    ) -> Result<(), BillingError> {
        if self.status != PaymentStatus::Pending {
            return Err(BillingError::illegal_transition("payment", self.status, "amend"));
        }
        validate_amount(&amount)?;
        if amount.currency() != self.amount.currency() {
            return Err(BillingError::validation("Payment currency cannot change"));
        }
        if (paid_on.year(), paid_on.month()) != (self.paid_on.year(), self.paid_on.month()) {
            return Err(BillingError::validation(format!(
                "Receipt {} was issued for {}; record a new payment for {}",
                self.receipt_number,
                self.paid_on.format("%Y-%m"),
                paid_on.format("%Y-%m")
            )));
        }

        self.amount = amount;
        self.method = method;
        self.paid_on = paid_on;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the payment as deleted without removing the row
    pub fn soft_delete(&mut self) -> Result<(), BillingError> {
        if self.deleted_at.is_some() {
            return Err(BillingError::illegal_transition("payment", "deleted", "delete"));
        }
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_transition(
        &self,
        target: PaymentStatus,
        action: &'static str,
    ) -> Result<(), BillingError> {
        if self.deleted_at.is_some() || !self.status.can_transition_to(target) {
            return Err(BillingError::illegal_transition("payment", self.status, action));
        }
        Ok(())
    }
}

pub(crate) fn validate_amount(amount: &Money) -> Result<(), BillingError> {
    if !amount.is_positive() {
        return Err(BillingError::validation(format!(
            "Payment amount must be positive, got {}",
            amount.amount()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn pending(amount: rust_decimal::Decimal) -> Payment {
        Payment::new(
            "KWT/2025/01/00001".to_string(),
            BillId::new(),
            StudentId::new(),
            Money::new(amount, Currency::IDR),
            PaymentMethod::Cash,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            UserId::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_status_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Verified.can_transition_to(Cancelled));
        assert!(!Verified.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(Verified));
    }

    #[test]
    fn test_verify_then_cancel() {
        let mut p = pending(dec!(300000));
        let verifier = UserId::new();
        p.verify(verifier).unwrap();
        assert_eq!(p.verified_by, Some(verifier));
        assert!(p.contributes());

        p.cancel("bounced transfer", UserId::new()).unwrap();
        assert_eq!(p.status, PaymentStatus::Cancelled);
        assert!(!p.contributes());
    }

    #[test]
    fn test_cannot_verify_cancelled() {
        let mut p = pending(dec!(300000));
        p.cancel("entered twice", UserId::new()).unwrap();
        let err = p.verify(UserId::new()).unwrap_err();
        assert!(matches!(err, BillingError::IllegalTransition { .. }));
        assert_eq!(p.status, PaymentStatus::Cancelled);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let result = Payment::new(
            "KWT/2025/01/00002".to_string(),
            BillId::new(),
            StudentId::new(),
            Money::new(dec!(-1), Currency::IDR),
            PaymentMethod::Cash,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            UserId::new(),
        );
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_amend_only_while_pending() {
        let mut p = pending(dec!(100000));
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        p.amend(Money::new(dec!(150000), Currency::IDR), PaymentMethod::BankTransfer, date)
            .unwrap();
        assert_eq!(p.amount.amount(), dec!(150000));

        p.verify(UserId::new()).unwrap();
        let err = p
            .amend(Money::new(dec!(1), Currency::IDR), PaymentMethod::Cash, date)
            .unwrap_err();
        assert!(err.is_business_rule());
    }

    #[test]
    fn test_amend_keeps_receipt_month() {
        let mut p = pending(dec!(100000));
        let amount = Money::new(dec!(100000), Currency::IDR);

        let february = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let err = p.amend(amount, PaymentMethod::Cash, february).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert_eq!(p.paid_on, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());

        let next_year = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert!(p.amend(amount, PaymentMethod::Cash, next_year).is_err());

        let end_of_month = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        p.amend(amount, PaymentMethod::Cash, end_of_month).unwrap();
        assert_eq!(p.paid_on, end_of_month);
        assert_eq!(p.receipt_number, "KWT/2025/01/00001");
    }
}
