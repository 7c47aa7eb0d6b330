//! Legacy payment repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::DatabaseError;

const PAYMENT_COLUMNS: &str = r#"
    payment_id, receipt_number, bill_id, student_id, currency, amount,
    method, paid_on, status, notes, recorded_by, verified_by, verified_at,
    cancelled_by, cancelled_at, cancellation_reason, deleted_at,
    created_at, updated_at
"#;

/// Database row for a receipt-style payment
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub bill_id: Uuid,
    pub student_id: Uuid,
    pub currency: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database enum for payment method, shared with payment transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    VirtualAccount,
    Qris,
    EWallet,
}

/// Database enum for payment status, shared with payment transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Cancelled,
}

pub async fn insert(conn: &mut PgConnection, row: &PaymentRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, receipt_number, bill_id, student_id, currency, amount,
            method, paid_on, status, notes, recorded_by, verified_by, verified_at,
            cancelled_by, cancelled_at, cancellation_reason, deleted_at,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(row.payment_id)
    .bind(&row.receipt_number)
    .bind(row.bill_id)
    .bind(row.student_id)
    .bind(&row.currency)
    .bind(row.amount)
    .bind(row.method)
    .bind(row.paid_on)
    .bind(row.status)
    .bind(&row.notes)
    .bind(row.recorded_by)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.deleted_at)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find(
    conn: &mut PgConnection,
    payment_id: Uuid,
    for_update: bool,
) -> Result<Option<PaymentRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM payments WHERE payment_id = $1{}",
        PAYMENT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Writes back everything except identity, receipt number and bill link
pub async fn update(conn: &mut PgConnection, row: &PaymentRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET
            amount = $2,
            method = $3,
            paid_on = $4,
            status = $5,
            notes = $6,
            verified_by = $7,
            verified_at = $8,
            cancelled_by = $9,
            cancelled_at = $10,
            cancellation_reason = $11,
            deleted_at = $12,
            updated_at = $13
        WHERE payment_id = $1
        "#,
    )
    .bind(row.payment_id)
    .bind(row.amount)
    .bind(row.method)
    .bind(row.paid_on)
    .bind(row.status)
    .bind(&row.notes)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.deleted_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Payment", row.payment_id));
    }
    Ok(())
}

/// All payments recorded against a bill, soft-deleted ones included
pub async fn for_bill(
    conn: &mut PgConnection,
    bill_id: Uuid,
) -> Result<Vec<PaymentRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM payments WHERE bill_id = $1 ORDER BY created_at, payment_id",
        PAYMENT_COLUMNS
    );

    let rows = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(bill_id)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Verified, live payments of one of the given amounts that no statement
/// line has claimed yet
///
/// `amounts` and `currencies` are parallel arrays; a payment qualifies when
/// it equals one of the pairs.
pub async fn unclaimed_with_amounts(
    conn: &mut PgConnection,
    amounts: &[Decimal],
    currencies: &[String],
) -> Result<Vec<PaymentRow>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {} FROM payments p
        WHERE p.status = 'verified'
          AND p.deleted_at IS NULL
          AND EXISTS (
              SELECT 1 FROM UNNEST($1::numeric[], $2::text[]) AS wanted(amount, currency)
              WHERE wanted.amount = p.amount AND wanted.currency = p.currency::text
          )
          AND NOT EXISTS (
              SELECT 1 FROM reconciliation_lines l WHERE l.matched_payment_id = p.payment_id
          )
        ORDER BY p.payment_id
        "#,
        PAYMENT_COLUMNS
    );

    let rows = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(amounts)
        .bind(currencies)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}
