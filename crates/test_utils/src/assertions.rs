//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that print the fields that matter
//! when they fail.

use core_kernel::{Money, PaymentId};
use domain_billing::{
    Bill, BillStatus, MatchType, ReconciliationBatch, ReconciliationLine,
};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that money values sum to a total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(parts, total.currency()).expect("Currency mismatch in sum");
    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum,
        total
    );
}

/// Asserts a bill's status together with its paid amount
pub fn assert_bill_state(bill: &Bill, status: BillStatus, amount_paid: Money) {
    assert_eq!(
        (bill.status, bill.amount_paid),
        (status, amount_paid),
        "Bill {} is {:?} with {} paid of {}",
        bill.id,
        bill.status,
        bill.amount_paid,
        bill.amount_due
    );
}

/// Asserts that a bill is fully paid
pub fn assert_bill_paid(bill: &Bill) {
    assert_eq!(
        bill.status,
        BillStatus::Paid,
        "Bill {} is {:?}, {} of {} paid",
        bill.id,
        bill.status,
        bill.amount_paid,
        bill.amount_due
    );
    assert!(bill.balance_due().is_zero() || bill.balance_due().is_negative());
}

/// Asserts a batch's line counters
pub fn assert_batch_counts(batch: &ReconciliationBatch, total: u32, matched: u32, unmatched: u32) {
    assert_eq!(
        (batch.total_transactions, batch.matched_count, batch.unmatched_count),
        (total, matched, unmatched),
        "Batch {} counters (total, matched, unmatched) differ",
        batch.id
    );
}

/// Asserts that a line is matched to `payment_id` with the given match type
pub fn assert_line_matched(
    line: &ReconciliationLine,
    payment_id: PaymentId,
    match_type: MatchType,
) {
    assert_eq!(
        line.matched_payment_id(),
        Some(payment_id),
        "Line {} is not matched to payment {}",
        line.line_number,
        payment_id
    );
    assert_eq!(line.match_type(), match_type, "Line {} match type", line.line_number);
}

/// Asserts that a line carries no match
pub fn assert_line_unmatched(line: &ReconciliationLine) {
    assert_eq!(
        line.match_type(),
        MatchType::Unmatched,
        "Line {} is matched to {:?}",
        line.line_number,
        line.matched_payment_id()
    );
}

/// Asserts that a decimal lies within a range (inclusive)
pub fn assert_decimal_in_range(value: Decimal, min: Decimal, max: Decimal) {
    assert!(
        value >= min && value <= max,
        "Value {} is not in range [{}, {}]",
        value,
        min,
        max
    );
}
