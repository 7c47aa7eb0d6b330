//! Payment transaction DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{PaymentItem, PaymentMethod, PaymentStatus, PaymentTransaction};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub payer_id: Uuid,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    /// Opaque reference returned by the proof-of-payment file store
    #[validate(length(min = 1, max = 255))]
    pub proof_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub bill_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub bill_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
}

impl From<PaymentItem> for ItemResponse {
    fn from(item: PaymentItem) -> Self {
        Self {
            id: item.id.into(),
            transaction_id: item.transaction_id.into(),
            bill_id: item.bill_id.into(),
            student_id: item.student_id.into(),
            amount: item.amount.amount(),
            currency: item.amount.currency().code().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub transaction_number: String,
    pub payer_id: Uuid,
    pub total_amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub proof_reference: Option<String>,
    pub status: PaymentStatus,
    pub recorded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResponse>>,
}

impl TransactionResponse {
    pub fn with_items(transaction: PaymentTransaction, items: Vec<PaymentItem>) -> Self {
        let mut response = Self::from(transaction);
        response.items = Some(items.into_iter().map(ItemResponse::from).collect());
        response
    }
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(transaction: PaymentTransaction) -> Self {
        Self {
            id: transaction.id.into(),
            currency: transaction.currency().code().to_string(),
            transaction_number: transaction.transaction_number,
            payer_id: transaction.payer_id.into(),
            total_amount: transaction.total_amount.amount(),
            method: transaction.method,
            paid_on: transaction.paid_on,
            proof_reference: transaction.proof_reference,
            status: transaction.status,
            recorded_by: transaction.recorded_by.into(),
            verified_by: transaction.verified_by.map(Into::into),
            verified_at: transaction.verified_at,
            cancelled_at: transaction.cancelled_at,
            cancellation_reason: transaction.cancellation_reason,
            created_at: transaction.created_at,
            items: None,
        }
    }
}
