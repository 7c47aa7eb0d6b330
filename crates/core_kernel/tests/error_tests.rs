//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::MoneyError;
use core_kernel::PortError;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::CurrencyMismatch("IDR".to_string(), "USD".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
}

#[test]
fn test_core_error_from_uuid_error() {
    let parse_error = uuid::Uuid::parse_str("nope").unwrap_err();
    let core_error: CoreError = parse_error.into();
    assert!(core_error.to_string().starts_with("Identifier error"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("Missing config");
    assert_eq!(error.to_string(), "Configuration error: Missing config");
}

#[test]
fn test_port_error_display() {
    let error = PortError::not_found("Payment", "PAY-1");
    assert_eq!(error.to_string(), "Not found: Payment with id PAY-1");
}
