//! Bill DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{Bill, BillStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    pub student_id: Uuid,
    pub category_id: Uuid,
    pub academic_year_id: Uuid,
    /// Absent for yearly fees
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
    pub amount_due: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DueBillsQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub category_id: Uuid,
    pub academic_year_id: Uuid,
    pub month: Option<u32>,
    pub currency: String,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub balance_due_display: String,
    pub status: BillStatus,
    pub due_date: NaiveDate,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Bill> for BillResponse {
    fn from(bill: Bill) -> Self {
        let balance = bill.balance_due();
        Self {
            id: bill.id.into(),
            student_id: bill.student_id.into(),
            category_id: bill.category_id.into(),
            academic_year_id: bill.period.academic_year_id.into(),
            month: bill.period.month,
            currency: bill.currency().code().to_string(),
            amount_due: bill.amount_due.amount(),
            amount_paid: bill.amount_paid.amount(),
            balance_due: balance.amount(),
            balance_due_display: balance.format_grouped(),
            status: bill.status,
            due_date: bill.due_date,
            cancelled_at: bill.cancelled_at,
            cancellation_reason: bill.cancellation_reason,
            deleted_at: bill.deleted_at,
            created_at: bill.created_at,
            updated_at: bill.updated_at,
        }
    }
}
