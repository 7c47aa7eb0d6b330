//! Request and response bodies
//!
//! Requests carry plain decimals; the handler attaches the ledger currency.
//! Responses flatten `Money` into an amount plus a currency code.

pub mod bills;
pub mod payments;
pub mod transactions;
pub mod reconciliation;

use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}
