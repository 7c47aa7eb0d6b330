//! Legacy payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_billing::{Payment, PaymentMethod, PaymentStatus};

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub bill_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AmendPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub receipt_number: String,
    pub bill_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub status: PaymentStatus,
    pub recorded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.into(),
            receipt_number: payment.receipt_number,
            bill_id: payment.bill_id.into(),
            student_id: payment.student_id.into(),
            amount: payment.amount.amount(),
            currency: payment.amount.currency().code().to_string(),
            method: payment.method,
            paid_on: payment.paid_on,
            status: payment.status,
            recorded_by: payment.recorded_by.into(),
            verified_by: payment.verified_by.map(Into::into),
            verified_at: payment.verified_at,
            cancelled_by: payment.cancelled_by.map(Into::into),
            cancelled_at: payment.cancelled_at,
            cancellation_reason: payment.cancellation_reason,
            deleted_at: payment.deleted_at,
            created_at: payment.created_at,
        }
    }
}
