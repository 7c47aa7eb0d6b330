//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the billing ledger. Values are fixed so that
//! receipt numbers, due dates and statement periods line up across tests.

use chrono::NaiveDate;
use core_kernel::{
    AcademicYearId, BillId, Currency, FeeCategoryId, GuardianId, Money, StudentId, UserId,
};
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Monthly tuition (SPP)
    pub fn idr_tuition() -> Money {
        Money::new(dec!(300000), Currency::IDR)
    }

    /// Half of the monthly tuition
    pub fn idr_half_tuition() -> Money {
        Money::new(dec!(150000), Currency::IDR)
    }

    /// Yearly building fee
    pub fn idr_building_fee() -> Money {
        Money::new(dec!(2500000), Currency::IDR)
    }

    /// Bank administration charge seen on statements
    pub fn idr_bank_fee() -> Money {
        Money::new(dec!(6500), Currency::IDR)
    }

    pub fn idr_zero() -> Money {
        Money::zero(Currency::IDR)
    }

    /// Foreign amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for calendar dates
pub struct DateFixtures;

impl DateFixtures {
    /// Due date of the January bill
    pub fn january_due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    /// Date the January bill is paid
    pub fn january_paid() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    pub fn february_due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
    }

    pub fn statement_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    pub fn statement_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Deterministic student ID
    pub fn student_id() -> StudentId {
        StudentId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000001").unwrap())
    }

    /// Deterministic guardian ID
    pub fn guardian_id() -> GuardianId {
        GuardianId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000002").unwrap())
    }

    /// Tuition fee category
    pub fn tuition_category() -> FeeCategoryId {
        FeeCategoryId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000003").unwrap())
    }

    /// 2024/2025 academic year
    pub fn academic_year() -> AcademicYearId {
        AcademicYearId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000004").unwrap())
    }

    /// Cashier recording payments
    pub fn cashier() -> UserId {
        UserId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000005").unwrap())
    }

    /// Supervisor verifying payments and batches
    pub fn supervisor() -> UserId {
        UserId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-000000000006").unwrap())
    }

    /// A bill ID that no store knows about
    pub fn missing_bill_id() -> BillId {
        BillId::from_uuid(Uuid::parse_str("0193a3e0-0000-7000-8000-0000000000ff").unwrap())
    }
}

/// Fixture for decimal test data
pub struct DecimalFixtures;

impl DecimalFixtures {
    /// Default auto-match threshold
    pub fn match_threshold() -> Decimal {
        dec!(0.70)
    }

    pub fn epsilon() -> Decimal {
        dec!(0.0001)
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn first_receipt_number() -> &'static str {
        "KWT/2025/01/00001"
    }

    pub fn first_transaction_number() -> &'static str {
        "TRX/2025/01/00001"
    }

    pub fn statement_file_name() -> &'static str {
        "mutasi-bca-2025-01.csv"
    }

    /// Bank description of an incoming transfer quoting `reference`
    pub fn transfer_description(reference: &str) -> String {
        let sender: String = Name().fake();
        format!("TRSF E-BANKING CR {} {}", reference, sender.to_uppercase())
    }

    /// Bank description of an incoming transfer with no usable reference
    pub fn anonymous_transfer() -> String {
        let sender: String = Name().fake();
        format!("TRSF E-BANKING CR {}", sender.to_uppercase())
    }

    pub fn bank_fee_description() -> &'static str {
        "BIAYA ADM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ids_are_distinct() {
        assert_ne!(IdFixtures::cashier(), IdFixtures::supervisor());
        assert_eq!(IdFixtures::student_id(), IdFixtures::student_id());
    }

    #[test]
    fn test_transfer_description_quotes_reference() {
        let description = StringFixtures::transfer_description("KWT/2025/01/00001");
        assert!(description.contains("KWT/2025/01/00001"));
    }

    #[test]
    fn test_statement_period_covers_payment_date() {
        assert!(DateFixtures::statement_start() <= DateFixtures::january_paid());
        assert!(DateFixtures::january_paid() <= DateFixtures::statement_end());
    }
}
