//! Comprehensive tests for domain_billing

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{
    AcademicYearId, BillId, Currency, FeeCategoryId, GuardianId, Money, PaymentTransactionId,
    ReconciliationBatchId, ReconciliationLineId, StudentId, UserId,
};

use domain_billing::bill::{Bill, BillStatus, BillingPeriod};
use domain_billing::matcher::{self, MatchingPolicy};
use domain_billing::payment::{Payment, PaymentMethod, PaymentStatus};
use domain_billing::recalculation;
use domain_billing::reconciliation::{
    BatchStatus, Direction, LineMatch, ReconciliationBatch, ReconciliationLine, StatementLineInput,
    StatementMetadata,
};
use domain_billing::transaction::{ItemContribution, PaymentItem, PaymentTransaction};
use domain_billing::BillingError;

fn idr(amount: Decimal) -> Money {
    Money::new(amount, Currency::IDR)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn test_bill(amount_due: Decimal) -> Bill {
    Bill::new(
        StudentId::new(),
        FeeCategoryId::new(),
        BillingPeriod::monthly(AcademicYearId::new(), 1).unwrap(),
        idr(amount_due),
        day(10),
    )
    .unwrap()
}

fn payment_for(bill: &Bill, amount: Decimal, status: PaymentStatus) -> Payment {
    let mut p = Payment::new(
        "KWT/2025/01/00001".to_string(),
        bill.id,
        bill.student_id,
        idr(amount),
        PaymentMethod::Cash,
        day(5),
        UserId::new(),
    )
    .unwrap();
    match status {
        PaymentStatus::Pending => {}
        PaymentStatus::Verified => p.verify(UserId::new()).unwrap(),
        PaymentStatus::Cancelled => p.cancel("voided", UserId::new()).unwrap(),
    }
    p
}

// ============================================================================
// Bill Tests
// ============================================================================

mod bill_tests {
    use super::*;

    #[test]
    fn test_new_bill_is_unpaid() {
        let bill = test_bill(dec!(300000));
        assert_eq!(bill.status, BillStatus::Unpaid);
        assert!(bill.amount_paid.is_zero());
        assert_eq!(bill.currency(), Currency::IDR);
        assert_eq!(bill.balance_due().amount(), dec!(300000));
    }

    #[test]
    fn test_overpayment_is_paid_with_zero_balance() {
        let mut bill = test_bill(dec!(300000));
        bill.apply_recalculation(idr(dec!(350000)));
        assert_eq!(bill.status, BillStatus::Paid);
        assert!(bill.balance_due().is_zero());
    }

    #[test]
    fn test_deleted_bill_no_longer_accepts_payments() {
        let mut bill = test_bill(dec!(300000));
        bill.soft_delete(UserId::new()).unwrap();
        assert!(!bill.accepts_payments());
        assert!(bill.soft_delete(UserId::new()).is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&BillStatus::Partial).unwrap(), "\"partial\"");
    }
}

// ============================================================================
// Payment Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[test]
    fn test_cancel_requires_reason() {
        let bill = test_bill(dec!(300000));
        let mut p = payment_for(&bill, dec!(1000), PaymentStatus::Pending);
        assert!(matches!(p.cancel("  ", UserId::new()), Err(BillingError::Validation(_))));
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_deleted_payment_cannot_be_verified() {
        let bill = test_bill(dec!(300000));
        let mut p = payment_for(&bill, dec!(1000), PaymentStatus::Pending);
        p.soft_delete().unwrap();
        assert!(p.verify(UserId::new()).is_err());
    }

    #[test]
    fn test_notes() {
        let bill = test_bill(dec!(300000));
        let p = payment_for(&bill, dec!(1000), PaymentStatus::Pending).with_notes("paid by uncle");
        assert_eq!(p.notes.as_deref(), Some("paid by uncle"));
    }
}

// ============================================================================
// Transaction Tests
// ============================================================================

mod transaction_tests {
    use super::*;

    fn transaction() -> PaymentTransaction {
        PaymentTransaction::new(
            "TRX/2025/01/00001".to_string(),
            GuardianId::new(),
            Currency::IDR,
            PaymentMethod::VirtualAccount,
            day(7),
            Some("proofs/2025/01/abc.jpg".to_string()),
            UserId::new(),
        )
    }

    #[test]
    fn test_cancel_after_verify() {
        let mut trx = transaction();
        trx.verify(UserId::new()).unwrap();
        trx.cancel("bank reversal", UserId::new()).unwrap();
        assert_eq!(trx.status, PaymentStatus::Cancelled);
        assert!(trx.cancelled_at.is_some());
        assert!(trx.cancel("again", UserId::new()).is_err());
    }

    #[test]
    fn test_item_amount_change_rejects_other_currency() {
        let trx = transaction();
        let mut item =
            PaymentItem::new(trx.id, BillId::new(), StudentId::new(), idr(dec!(1000))).unwrap();
        let result = item.set_amount(Money::new(dec!(1000), Currency::USD));
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_item_of_unverified_transaction_does_not_contribute() {
        let contribution = ItemContribution {
            item: PaymentItem::new(
                PaymentTransactionId::new(),
                BillId::new(),
                StudentId::new(),
                idr(dec!(1)),
            )
            .unwrap(),
            transaction_status: PaymentStatus::Pending,
        };
        assert!(!contribution.contributes());
    }
}

// ============================================================================
// Reconciliation Tests
// ============================================================================

mod reconciliation_tests {
    use super::*;

    #[test]
    fn test_import_rejects_inverted_period() {
        let metadata = StatementMetadata {
            file_name: "mutasi.csv".to_string(),
            file_reference: None,
            bank_account: None,
            period_start: day(31),
            period_end: day(1),
        };
        let result = ReconciliationBatch::import(metadata, Currency::IDR, UserId::new(), vec![]);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_debit_only_statement_is_complete_on_import() {
        let metadata = StatementMetadata {
            file_name: "mutasi.csv".to_string(),
            file_reference: None,
            bank_account: None,
            period_start: day(1),
            period_end: day(31),
        };
        let input = StatementLineInput {
            transaction_date: day(3),
            description: "BIAYA ADM".to_string(),
            amount: idr(dec!(15000)),
            direction: Direction::Debit,
            reference: None,
        };
        let (batch, _) =
            ReconciliationBatch::import(metadata, Currency::IDR, UserId::new(), vec![input])
                .unwrap();
        assert_eq!(batch.total_transactions, 1);
        assert!(batch.total_amount.is_zero());
        assert_eq!(batch.status, BatchStatus::Completed);
    }

    #[test]
    fn test_line_match_serializes_with_tag() {
        let json = serde_json::to_value(LineMatch::Unmatched).unwrap();
        assert_eq!(json["match_type"], "unmatched");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn status_strategy() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Pending),
        Just(PaymentStatus::Verified),
        Just(PaymentStatus::Cancelled),
    ]
}

fn statement_line(amount: i64, d: u32) -> ReconciliationLine {
    let now = Utc::now();
    ReconciliationLine {
        id: ReconciliationLineId::new_v7(),
        batch_id: ReconciliationBatchId::new(),
        line_number: 1,
        transaction_date: day(d),
        description: "TRSF".to_string(),
        amount: Money::from_minor(amount, Currency::IDR),
        direction: Direction::Credit,
        reference: None,
        match_state: LineMatch::Unmatched,
        created_at: now,
        updated_at: now,
    }
}

proptest! {
    #[test]
    fn classify_is_monotonic_in_amount_paid(
        due in 1i64..10_000_000,
        a in 0i64..20_000_000,
        b in 0i64..20_000_000,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let rank = |s: BillStatus| match s {
            BillStatus::Unpaid => 0,
            BillStatus::Partial => 1,
            BillStatus::Paid => 2,
            BillStatus::Cancelled => 3,
        };
        let s_low = BillStatus::classify(Decimal::from(due), Decimal::from(low));
        let s_high = BillStatus::classify(Decimal::from(due), Decimal::from(high));
        prop_assert!(rank(s_low) <= rank(s_high));
    }

    #[test]
    fn amount_paid_equals_sum_of_verified_contributions(
        payments in prop::collection::vec((1i64..500_000, status_strategy()), 0..8),
        items in prop::collection::vec((1i64..500_000, status_strategy()), 0..8),
    ) {
        let mut bill = test_bill(dec!(1000000));
        let legacy: Vec<Payment> = payments
            .iter()
            .map(|(amount, status)| payment_for(&bill, Decimal::from(*amount), *status))
            .collect();
        let contributions: Vec<ItemContribution> = items
            .iter()
            .map(|(amount, status)| {
                let amount = idr(Decimal::from(*amount));
                let trx_id = PaymentTransactionId::new();
                ItemContribution {
                    item: PaymentItem::new(trx_id, bill.id, bill.student_id, amount).unwrap(),
                    transaction_status: *status,
                }
            })
            .collect();

        let expected: i64 = payments.iter().chain(items.iter())
            .filter(|(_, s)| *s == PaymentStatus::Verified)
            .map(|(a, _)| *a)
            .sum();

        recalculation::recalculate(&mut bill, &legacy, &contributions).unwrap();
        prop_assert_eq!(bill.amount_paid.amount(), Decimal::from(expected));
        let derived = BillStatus::classify(bill.amount_due.amount(), bill.amount_paid.amount());
        prop_assert_eq!(bill.status, derived);

        let (_, changed) = recalculation::recalculate(&mut bill, &legacy, &contributions).unwrap();
        prop_assert!(!changed);
    }

    #[test]
    fn transaction_total_equals_sum_of_items(
        amounts in prop::collection::vec(1i64..1_000_000, 0..10),
        remove in 0usize..10,
    ) {
        let mut trx = PaymentTransaction::new(
            "TRX/2025/01/00001".to_string(),
            GuardianId::new(),
            Currency::IDR,
            PaymentMethod::Cash,
            day(1),
            None,
            UserId::new(),
        );
        let mut items: Vec<PaymentItem> = amounts
            .iter()
            .map(|a| {
                let amount = idr(Decimal::from(*a));
                PaymentItem::new(trx.id, BillId::new(), StudentId::new(), amount).unwrap()
            })
            .collect();
        if remove < items.len() {
            items.remove(remove);
        }

        trx.recompute_total(&items).unwrap();
        let expected: Decimal = items.iter().map(|i| i.amount.amount()).sum();
        prop_assert_eq!(trx.total_amount.amount(), expected);
    }

    #[test]
    fn matching_is_deterministic(
        specs in prop::collection::vec((1i64..5, 1u32..10), 1..6),
        payments in prop::collection::vec((1i64..5, 1u32..10), 0..6),
    ) {
        let policy = MatchingPolicy::default();
        let lines: Vec<ReconciliationLine> =
            specs.iter().map(|(a, d)| statement_line(*a * 100_000, *d)).collect();
        let bill = test_bill(dec!(1000000));
        let pool: Vec<Payment> = payments
            .iter()
            .map(|(a, d)| {
                let amount = Decimal::from(*a * 100_000);
                let mut p = payment_for(&bill, amount, PaymentStatus::Verified);
                p.paid_on = day(*d);
                p
            })
            .collect();

        let first = matcher::plan_pass(&policy, &lines, &pool);
        let second = matcher::plan_pass(&policy, &lines, &pool);
        prop_assert_eq!(&first, &second);

        let mut claimed: Vec<_> = first.iter().map(|m| m.payment_id).collect();
        claimed.sort();
        claimed.dedup();
        prop_assert_eq!(claimed.len(), first.len());
    }
}
