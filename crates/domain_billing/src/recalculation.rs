//! Balance recalculation
//!
//! A bill's `amount_paid` is re-derived from scratch every time something
//! that feeds it changes:
//!
//! ```text
//! amount_paid = Σ verified legacy payments + Σ items of verified transactions
//! status      = classify(amount_due, amount_paid)   (unless cancelled)
//! ```
//!
//! The functions here are pure over their inputs, so running them twice on
//! the same verified set gives the same answer and concurrent triggers for
//! one bill are harmless.

use serde::{Deserialize, Serialize};

use core_kernel::Money;
use crate::bill::{Bill, BillStatus};
use crate::error::BillingError;
use crate::payment::Payment;
use crate::transaction::ItemContribution;

/// Breakdown of a recalculated bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recalculation {
    /// Verified legacy payments
    pub legacy_total: Money,
    /// Items of verified transactions
    pub item_total: Money,
    /// `legacy_total + item_total`
    pub amount_paid: Money,
    /// Status the bill should carry
    pub status: BillStatus,
}

/// Computes what the bill's derived fields should be
///
/// Payments and items that belong to other bills are ignored, as are
/// soft-deleted payments and anything not verified. A cancelled bill keeps
/// its stored paid amount and status.
pub fn compute(
    bill: &Bill,
    payments: &[Payment],
    items: &[ItemContribution],
) -> Result<Recalculation, BillingError> {
    let currency = bill.currency();

    if bill.is_cancelled() {
        return Ok(Recalculation {
            legacy_total: Money::zero(currency),
            item_total: Money::zero(currency),
            amount_paid: bill.amount_paid,
            status: BillStatus::Cancelled,
        });
    }

    let legacy_total = Money::sum(
        payments
            .iter()
            .filter(|p| p.bill_id == bill.id && p.contributes())
            .map(|p| &p.amount),
        currency,
    )?;

    let item_total = Money::sum(
        items
            .iter()
            .filter(|c| c.item.bill_id == bill.id && c.contributes())
            .map(|c| &c.item.amount),
        currency,
    )?;

    let amount_paid = legacy_total.checked_add(&item_total)?;

    Ok(Recalculation {
        legacy_total,
        item_total,
        amount_paid,
        status: BillStatus::classify(bill.amount_due.amount(), amount_paid.amount()),
    })
}

/// Recomputes and stores the derived fields on `bill`
///
/// Returns the breakdown and whether anything changed.
pub fn recalculate(
    bill: &mut Bill,
    payments: &[Payment],
    items: &[ItemContribution],
) -> Result<(Recalculation, bool), BillingError> {
    let result = compute(bill, payments, items)?;
    let changed = bill.apply_recalculation(result.amount_paid);
    Ok((result, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{
        AcademicYearId, BillId, Currency, FeeCategoryId, PaymentTransactionId, StudentId, UserId,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::bill::BillingPeriod;
    use crate::payment::{PaymentMethod, PaymentStatus};
    use crate::transaction::PaymentItem;

    fn idr(amount: Decimal) -> Money {
        Money::new(amount, Currency::IDR)
    }

    fn bill(amount: Decimal) -> Bill {
        Bill::new(
            StudentId::new(),
            FeeCategoryId::new(),
            BillingPeriod::yearly(AcademicYearId::new()),
            idr(amount),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        )
        .unwrap()
    }

    fn payment(bill: &Bill, amount: Decimal, verified: bool) -> Payment {
        let mut p = Payment::new(
            "KWT/2025/01/00001".to_string(),
            bill.id,
            bill.student_id,
            idr(amount),
            PaymentMethod::Cash,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            UserId::new(),
        )
        .unwrap();
        if verified {
            p.verify(UserId::new()).unwrap();
        }
        p
    }

    fn item(bill_id: BillId, amount: Decimal, status: PaymentStatus) -> ItemContribution {
        ItemContribution {
            item: PaymentItem::new(
                PaymentTransactionId::new(),
                bill_id,
                StudentId::new(),
                idr(amount),
            )
            .unwrap(),
            transaction_status: status,
        }
    }

    #[test]
    fn test_full_single_payment() {
        let mut b = bill(dec!(300000));
        let payments = vec![payment(&b, dec!(300000), true)];

        let (result, changed) = recalculate(&mut b, &payments, &[]).unwrap();
        assert!(changed);
        assert_eq!(result.amount_paid.amount(), dec!(300000));
        assert_eq!(b.status, BillStatus::Paid);
    }

    #[test]
    fn test_pending_and_deleted_payments_do_not_count() {
        let mut b = bill(dec!(300000));
        let mut deleted = payment(&b, dec!(50000), true);
        deleted.soft_delete().unwrap();
        let payments = vec![payment(&b, dec!(100000), false), deleted];

        recalculate(&mut b, &payments, &[]).unwrap();
        assert!(b.amount_paid.is_zero());
        assert_eq!(b.status, BillStatus::Unpaid);
    }

    #[test]
    fn test_legacy_and_item_sources_are_summed() {
        let mut b = bill(dec!(300000));
        let payments = vec![payment(&b, dec!(100000), true)];
        let items = vec![
            item(b.id, dec!(150000), PaymentStatus::Verified),
            item(b.id, dec!(50000), PaymentStatus::Pending),
            item(BillId::new(), dec!(999999), PaymentStatus::Verified),
        ];

        let (result, _) = recalculate(&mut b, &payments, &items).unwrap();
        assert_eq!(result.legacy_total.amount(), dec!(100000));
        assert_eq!(result.item_total.amount(), dec!(150000));
        assert_eq!(b.amount_paid.amount(), dec!(250000));
        assert_eq!(b.status, BillStatus::Partial);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let mut b = bill(dec!(300000));
        let payments = vec![payment(&b, dec!(100000), true)];

        recalculate(&mut b, &payments, &[]).unwrap();
        let snapshot = (b.amount_paid, b.status);
        let (_, changed) = recalculate(&mut b, &payments, &[]).unwrap();
        assert!(!changed);
        assert_eq!((b.amount_paid, b.status), snapshot);
    }

    #[test]
    fn test_cancelled_bill_short_circuits() {
        let mut b = bill(dec!(300000));
        b.cancel("student withdrew", UserId::new()).unwrap();
        let payments = vec![payment(&b, dec!(300000), true)];

        let (result, changed) = recalculate(&mut b, &payments, &[]).unwrap();
        assert!(!changed);
        assert_eq!(result.status, BillStatus::Cancelled);
        assert!(b.amount_paid.is_zero());
    }
}
