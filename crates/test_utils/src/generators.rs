//! Property-Based Test Generators
//!
//! Proptest strategies for ledger data that respects domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{Currency, Money};
use domain_billing::{Direction, PaymentMethod, StatementLineInput};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for the supported currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::IDR),
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::SGD),
        Just(Currency::MYR),
    ]
}

/// Strategy for positive rupiah amounts in whole thousands, as schools bill them
pub fn idr_amount_strategy() -> impl Strategy<Value = Money> {
    (1i64..=10_000i64)
        .prop_map(|thousands| Money::new(Decimal::new(thousands * 1000, 0), Currency::IDR))
}

/// Strategy for positive amounts in any currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..1_000_000_000i64, currency_strategy())
        .prop_map(|(minor, currency)| Money::from_minor(minor, currency))
}

/// Splits `total` into `parts` positive rupiah amounts summing to it
pub fn idr_split_strategy(total_thousands: i64, parts: usize) -> impl Strategy<Value = Vec<Money>> {
    proptest::collection::vec(1i64..100i64, parts..=parts).prop_map(move |weights| {
        let weight_sum: i64 = weights.iter().sum();
        let mut remaining = total_thousands;
        let mut amounts = Vec::with_capacity(weights.len());
        for (i, weight) in weights.iter().enumerate() {
            let share = if i + 1 == weights.len() {
                remaining
            } else {
                let reserved = (weights.len() - i - 1) as i64;
                (total_thousands * weight / weight_sum).max(1).min(remaining - reserved)
            };
            remaining -= share;
            amounts.push(Money::new(Decimal::new(share * 1000, 0), Currency::IDR));
        }
        amounts
    })
}

/// Strategy for dates within 2025
pub fn date_2025_strategy() -> impl Strategy<Value = NaiveDate> {
    let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    (0i64..365i64).prop_map(move |days| new_year + Duration::days(days))
}

/// Strategy for payment methods
pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::VirtualAccount),
        Just(PaymentMethod::Qris),
        Just(PaymentMethod::EWallet),
    ]
}

/// Strategy for statement lines in rupiah
pub fn statement_line_strategy() -> impl Strategy<Value = StatementLineInput> {
    (
        date_2025_strategy(),
        "[A-Z ]{4,30}",
        idr_amount_strategy(),
        prop_oneof![Just(Direction::Credit), Just(Direction::Debit)],
    )
        .prop_map(|(transaction_date, description, amount, direction)| StatementLineInput {
            transaction_date,
            description,
            amount,
            direction,
            reference: None,
        })
}

/// Strategy for a non-empty statement
pub fn statement_lines_strategy(
    max_lines: usize,
) -> impl Strategy<Value = Vec<StatementLineInput>> {
    proptest::collection::vec(statement_line_strategy(), 1..=max_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn idr_amounts_are_positive_whole_thousands(money in idr_amount_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.amount() % Decimal::new(1000, 0), Decimal::ZERO);
        }

        #[test]
        fn splits_sum_to_total(parts in idr_split_strategy(300, 3)) {
            let total = Money::sum(&parts, Currency::IDR).unwrap();
            prop_assert_eq!(total.amount(), Decimal::new(300_000, 0));
            prop_assert!(parts.iter().all(|p| p.is_positive()));
        }

        #[test]
        fn money_in_any_currency_is_positive(
            money in positive_money_strategy(),
            _method in payment_method_strategy(),
        ) {
            prop_assert!(money.is_positive());
        }

        #[test]
        fn dates_stay_in_2025(date in date_2025_strategy()) {
            prop_assert_eq!(chrono::Datelike::year(&date), 2025);
        }

        #[test]
        fn statements_are_never_empty(lines in statement_lines_strategy(10)) {
            prop_assert!(!lines.is_empty() && lines.len() <= 10);
        }
    }
}
