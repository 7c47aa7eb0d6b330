//! Bill repository
//!
//! Row-level access to the `bills` table. Every function runs on the
//! caller's connection so that reads, locks and writes of one ledger
//! operation share a single database transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::DatabaseError;

const BILL_COLUMNS: &str = r#"
    bill_id, student_id, category_id, academic_year_id, period_month,
    currency, amount_due, amount_paid, status, due_date,
    cancelled_by, cancelled_at, cancellation_reason,
    deleted_at, deleted_by, created_at, updated_at
"#;

/// Database row for a bill
#[derive(Debug, Clone, FromRow)]
pub struct BillRow {
    pub bill_id: Uuid,
    pub student_id: Uuid,
    pub category_id: Uuid,
    pub academic_year_id: Uuid,
    pub period_month: Option<i16>,
    pub currency: String,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub status: BillStatus,
    pub due_date: NaiveDate,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database enum for bill status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "snake_case")]
pub enum BillStatus {
    Unpaid,
    Partial,
    Paid,
    Cancelled,
}

pub async fn insert(conn: &mut PgConnection, row: &BillRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            bill_id, student_id, category_id, academic_year_id, period_month,
            currency, amount_due, amount_paid, status, due_date,
            cancelled_by, cancelled_at, cancellation_reason,
            deleted_at, deleted_by, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(row.bill_id)
    .bind(row.student_id)
    .bind(row.category_id)
    .bind(row.academic_year_id)
    .bind(row.period_month)
    .bind(&row.currency)
    .bind(row.amount_due)
    .bind(row.amount_paid)
    .bind(row.status)
    .bind(row.due_date)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.deleted_at)
    .bind(row.deleted_by)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a bill, optionally taking a row lock until the transaction ends
pub async fn find(
    conn: &mut PgConnection,
    bill_id: Uuid,
    for_update: bool,
) -> Result<Option<BillRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM bills WHERE bill_id = $1{}",
        BILL_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, BillRow>(&sql)
        .bind(bill_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Writes back the mutable part of a bill
///
/// Identity, student, category, period, amount due and due date are fixed
/// at creation and are not touched here.
pub async fn update(conn: &mut PgConnection, row: &BillRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE bills SET
            amount_paid = $2,
            status = $3,
            cancelled_by = $4,
            cancelled_at = $5,
            cancellation_reason = $6,
            deleted_at = $7,
            deleted_by = $8,
            updated_at = $9
        WHERE bill_id = $1
        "#,
    )
    .bind(row.bill_id)
    .bind(row.amount_paid)
    .bind(row.status)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.deleted_at)
    .bind(row.deleted_by)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Bill", row.bill_id));
    }
    Ok(())
}

/// Outstanding, live bills whose due date has passed `as_of`
pub async fn due_on_or_before(
    conn: &mut PgConnection,
    as_of: NaiveDate,
) -> Result<Vec<BillRow>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {} FROM bills
        WHERE deleted_at IS NULL
          AND status IN ('unpaid', 'partial')
          AND due_date <= $1
        ORDER BY due_date, bill_id
        "#,
        BILL_COLUMNS
    );

    let rows = sqlx::query_as::<_, BillRow>(&sql)
        .bind(as_of)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}
