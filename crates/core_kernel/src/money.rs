//! Money types with precise decimal arithmetic
//!
//! Every monetary amount in the ledger is a `Money`: a `rust_decimal`
//! amount tagged with its currency. Floating point never appears on a
//! money path, so recalculation passes cannot drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    IDR,
    USD,
    EUR,
    SGD,
    MYR,
}

impl Currency {
    /// Returns the number of decimal places shown for this currency
    ///
    /// Rupiah is quoted without minor units in school billing.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::IDR => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::IDR => "Rp",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::SGD => "S$",
            Currency::MYR => "RM",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::IDR => "IDR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::SGD => "SGD",
            Currency::MYR => "MYR",
        }
    }

    /// Thousands and decimal separators used when presenting amounts
    fn separators(&self) -> (char, char) {
        match self {
            Currency::IDR | Currency::EUR => ('.', ','),
            _ => (',', '.'),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IDR" => Ok(Currency::IDR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "SGD" => Ok(Currency::SGD),
            "MYR" => Ok(Currency::MYR),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount with associated currency
///
/// Amounts are kept at 4 decimal places internally, matching the
/// `NUMERIC(18, 4)` columns they are persisted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates Money from an integer amount in minor units
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Sums a sequence of amounts, all of which must be in `currency`
    pub fn sum<'a, I>(amounts: I, currency: Currency) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Returns the larger of two amounts in the same currency
    pub fn max(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        Ok(if other.amount > self.amount { other } else { self })
    }

    /// Renders the amount for people: `Rp 300.000`, `$ 1,250.50`
    ///
    /// Presentation only; rounding here never feeds back into the ledger.
    pub fn format_grouped(&self) -> String {
        let dp = self.currency.decimal_places();
        let rounded = self.amount.round_dp(dp).abs();
        let text = format!("{:.dp$}", rounded, dp = dp as usize);
        let (int_part, frac_part) = match text.split_once('.') {
            Some((int_part, frac)) => (int_part.to_string(), Some(frac.to_string())),
            None => (text.clone(), None),
        };

        let (group_sep, decimal_sep) = self.currency.separators();
        let digits = int_part.len();
        let mut grouped = String::with_capacity(digits + digits / 3 + 4);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (digits - i) % 3 == 0 {
                grouped.push(group_sep);
            }
            grouped.push(ch);
        }
        if let Some(frac) = frac_part {
            grouped.push(decimal_sep);
            grouped.push_str(&frac);
        }

        let sign = if self.is_negative() && !rounded.is_zero() { "-" } else { "" };
        format!("{}{} {}", sign, self.currency.symbol(), grouped)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_grouped())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other)
            .expect("Currency mismatch in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_creation() {
        let m = Money::new(dec!(300000), Currency::IDR);
        assert_eq!(m.amount(), dec!(300000));
        assert_eq!(m.currency(), Currency::IDR);
    }

    #[test]
    fn test_money_from_minor() {
        assert_eq!(Money::from_minor(10050, Currency::USD).amount(), dec!(100.50));
        assert_eq!(Money::from_minor(150000, Currency::IDR).amount(), dec!(150000));
    }

    #[test]
    fn test_currency_mismatch() {
        let idr = Money::new(dec!(100), Currency::IDR);
        let usd = Money::new(dec!(100), Currency::USD);

        let result = idr.checked_add(&usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_sum() {
        let parts = [
            Money::new(dec!(100000), Currency::IDR),
            Money::new(dec!(200000), Currency::IDR),
        ];
        let total = Money::sum(&parts, Currency::IDR).unwrap();
        assert_eq!(total.amount(), dec!(300000));
        assert!(Money::sum(&[], Currency::IDR).unwrap().is_zero());
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(Money::new(dec!(300000), Currency::IDR).format_grouped(), "Rp 300.000");
        assert_eq!(Money::new(dec!(1250000), Currency::IDR).format_grouped(), "Rp 1.250.000");
        assert_eq!(Money::new(dec!(999), Currency::IDR).format_grouped(), "Rp 999");
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(Money::new(dec!(1250.5), Currency::USD).format_grouped(), "$ 1,250.50");
        assert_eq!(Money::new(dec!(-75), Currency::USD).format_grouped(), "-$ 75.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("idr".parse::<Currency>().unwrap(), Currency::IDR);
        assert!("XYZ".parse::<Currency>().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_addition_is_associative(
            a in 0i64..1_000_000_000i64,
            b in 0i64..1_000_000_000i64,
            c in 0i64..1_000_000_000i64
        ) {
            let ma = Money::from_minor(a, Currency::IDR);
            let mb = Money::from_minor(b, Currency::IDR);
            let mc = Money::from_minor(c, Currency::IDR);

            prop_assert_eq!((ma + mb) + mc, ma + (mb + mc));
        }

        #[test]
        fn grouped_format_keeps_every_digit(amount in 0i64..10_000_000_000i64) {
            let money = Money::from_minor(amount, Currency::IDR);
            let grouped = money.format_grouped();
            let digits: String = grouped.chars().filter(|c| c.is_ascii_digit()).collect();
            prop_assert_eq!(digits, amount.to_string());
        }
    }
}
