//! Comprehensive unit tests for the Money module
//!
//! Tests cover money creation, arithmetic, currency handling and the
//! presentation formatting used on receipts and reminders.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(300000), Currency::IDR);
        assert_eq!(m.amount(), dec!(300000));
        assert_eq!(m.currency(), Currency::IDR);
    }

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::USD);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_handles_rupiah_without_decimals() {
        let m = Money::from_minor(150000, Currency::IDR);
        assert_eq!(m.amount(), dec!(150000));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::IDR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_add_and_sub() {
        let a = Money::new(dec!(200000), Currency::IDR);
        let b = Money::new(dec!(50000), Currency::IDR);

        assert_eq!((a + b).amount(), dec!(250000));
        assert_eq!((a - b).amount(), dec!(150000));
        assert_eq!((-b).amount(), dec!(-50000));
    }

    #[test]
    fn test_checked_sub_currency_mismatch() {
        let a = Money::new(dec!(1), Currency::IDR);
        let b = Money::new(dec!(1), Currency::SGD);
        assert_eq!(
            a.checked_sub(&b),
            Err(MoneyError::CurrencyMismatch("IDR".to_string(), "SGD".to_string()))
        );
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let parts = [
            Money::new(dec!(1), Currency::IDR),
            Money::new(dec!(1), Currency::USD),
        ];
        assert!(Money::sum(&parts, Currency::IDR).is_err());
    }

    #[test]
    fn test_max() {
        let a = Money::new(dec!(10), Currency::IDR);
        let b = Money::new(dec!(20), Currency::IDR);
        assert_eq!(a.max(b).unwrap(), b);
        assert_eq!(b.max(a).unwrap(), b);
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_operator_add_panics_on_mismatch() {
        let _ = Money::new(dec!(1), Currency::IDR) + Money::new(dec!(1), Currency::EUR);
    }
}

mod formatting {
    use super::*;

    #[test]
    fn test_rupiah_grouping() {
        assert_eq!(Money::new(dec!(0), Currency::IDR).format_grouped(), "Rp 0");
        assert_eq!(Money::new(dec!(1000), Currency::IDR).format_grouped(), "Rp 1.000");
        assert_eq!(Money::new(dec!(12500000), Currency::IDR).format_grouped(), "Rp 12.500.000");
    }

    #[test]
    fn test_rupiah_rounds_fractions_for_display() {
        let m = Money::new(dec!(150000.75), Currency::IDR);
        assert_eq!(m.format_grouped(), "Rp 150.001");
        assert_eq!(m.amount(), dec!(150000.75));
    }

    #[test]
    fn test_euro_uses_comma_decimals() {
        assert_eq!(Money::new(dec!(1234.5), Currency::EUR).format_grouped(), "€ 1.234,50");
    }

    #[test]
    fn test_display_matches_grouped_format() {
        let m = Money::new(dec!(300000), Currency::IDR);
        assert_eq!(m.to_string(), "Rp 300.000");
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_currency_serializes_uppercase() {
        let json = serde_json::to_string(&Currency::IDR).unwrap();
        assert_eq!(json, "\"IDR\"");
    }

    #[test]
    fn test_money_json_keeps_exact_amount() {
        let m = Money::new(dec!(300000.50), Currency::IDR);
        let json = serde_json::to_string(&m).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount(), dec!(300000.50));
        assert_ne!(back.amount(), Decimal::ZERO);
    }
}
