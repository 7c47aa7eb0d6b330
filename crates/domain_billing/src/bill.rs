//! Bills
//!
//! A bill is one obligation owed by one student for one fee category and
//! billing period. `amount_paid` and `status` are derived: they are only
//! ever written by [`Bill::apply_recalculation`] and by the explicit
//! cancellation path.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AcademicYearId, BillId, Currency, FeeCategoryId, Money, StudentId, UserId};
use crate::error::BillingError;

/// Bill status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Nothing verified yet
    Unpaid,
    /// Some, but not all, of the amount due is verified
    Partial,
    /// Verified payments cover the amount due
    Paid,
    /// Explicitly cancelled; recalculation no longer applies
    Cancelled,
}

impl BillStatus {
    /// Classifies a bill from its amount due and verified paid amount
    ///
    /// Never yields `Cancelled`; that status is only set explicitly.
    pub fn classify(amount_due: Decimal, amount_paid: Decimal) -> BillStatus {
        if amount_paid >= amount_due {
            BillStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            BillStatus::Partial
        } else {
            BillStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Partial => "partial",
            BillStatus::Paid => "paid",
            BillStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if a reminder may still be sent for this status
    pub fn is_outstanding(&self) -> bool {
        matches!(self, BillStatus::Unpaid | BillStatus::Partial)
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Academic year plus an optional month within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub academic_year_id: AcademicYearId,
    /// Calendar month (1-12) for monthly fees, `None` for yearly fees
    pub month: Option<u32>,
}

impl BillingPeriod {
    pub fn yearly(academic_year_id: AcademicYearId) -> Self {
        Self { academic_year_id, month: None }
    }

    pub fn monthly(academic_year_id: AcademicYearId, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::validation(format!("Invalid billing month: {}", month)));
        }
        Ok(Self { academic_year_id, month: Some(month) })
    }
}

/// A student's obligation for one category and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub id: BillId,
    /// Student who owes the amount
    pub student_id: StudentId,
    /// Fee category (tuition, uniform, trip, ...)
    pub category_id: FeeCategoryId,
    /// Billing period
    pub period: BillingPeriod,
    /// Amount owed
    pub amount_due: Money,
    /// Sum of verified contributions, derived
    pub amount_paid: Money,
    /// Derived status
    pub status: BillStatus,
    /// Due date
    pub due_date: NaiveDate,
    pub cancelled_by: Option<UserId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Creates a new unpaid bill
    ///
    /// # Arguments
    ///
    /// * `student_id` - Student being billed
    /// * `category_id` - Fee category
    /// * `period` - Academic year and optional month
    /// * `amount_due` - Amount owed, must be positive
    /// * `due_date` - Payment due date
    pub fn new(
        student_id: StudentId,
        category_id: FeeCategoryId,
        period: BillingPeriod,
        amount_due: Money,
        due_date: NaiveDate,
    ) -> Result<Self, BillingError> {
        if !amount_due.is_positive() {
            return Err(BillingError::validation("Bill amount due must be positive"));
        }

        let now = Utc::now();
        Ok(Self {
            id: BillId::new_v7(),
            student_id,
            category_id,
            period,
            amount_due,
            amount_paid: Money::zero(amount_due.currency()),
            status: BillStatus::Unpaid,
            due_date,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the bill currency
    pub fn currency(&self) -> Currency {
        self.amount_due.currency()
    }

    /// Returns the remaining balance, never negative
    pub fn balance_due(&self) -> Money {
        let remaining = self.amount_due.amount() - self.amount_paid.amount();
        Money::new(remaining.max(Decimal::ZERO), self.currency())
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BillStatus::Cancelled
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if new payments or items may be allocated to this bill
    pub fn accepts_payments(&self) -> bool {
        !self.is_cancelled() && !self.is_deleted()
    }

    /// Applies a freshly recomputed paid amount
    ///
    /// Cancelled bills are left untouched. Returns true if the stored
    /// `(amount_paid, status)` pair changed.
    pub fn apply_recalculation(&mut self, amount_paid: Money) -> bool {
        if self.is_cancelled() {
            return false;
        }

        let status = BillStatus::classify(self.amount_due.amount(), amount_paid.amount());
        if self.amount_paid == amount_paid && self.status == status {
            return false;
        }

        self.amount_paid = amount_paid;
        self.status = status;
        self.updated_at = Utc::now();
        true
    }

    /// Cancels the bill
    pub fn cancel(&mut self, reason: impl Into<String>, actor: UserId) -> Result<(), BillingError> {
        if self.is_cancelled() || self.is_deleted() {
            return Err(BillingError::illegal_transition("bill", self.status, "cancel"));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(BillingError::validation("Cancellation reason is required"));
        }

        let now = Utc::now();
        self.status = BillStatus::Cancelled;
        self.cancelled_by = Some(actor);
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the bill as deleted without removing the row
    pub fn soft_delete(&mut self, actor: UserId) -> Result<(), BillingError> {
        if self.is_deleted() {
            return Err(BillingError::illegal_transition("bill", "deleted", "delete"));
        }
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor);
        self.updated_at = now;
        Ok(())
    }
}
