//! Payment transaction and item repository
//!
//! Items reference their transaction with `ON DELETE CASCADE`, but the
//! ledger never deletes transactions; cancelled ones stay for audit.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::repositories::payments::{PaymentMethod, PaymentStatus};

const TRANSACTION_COLUMNS: &str = r#"
    transaction_id, transaction_number, payer_id, currency, total_amount,
    method, paid_on, proof_reference, status, notes, recorded_by,
    verified_by, verified_at, cancelled_by, cancelled_at, cancellation_reason,
    created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    item_id, transaction_id, bill_id, student_id, currency, amount,
    created_at, updated_at
"#;

/// Database row for a payment transaction header
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub transaction_id: Uuid,
    pub transaction_number: String,
    pub payer_id: Uuid,
    pub currency: String,
    pub total_amount: Decimal,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub proof_reference: Option<String>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for one bill allocation inside a transaction
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub item_id: Uuid,
    pub transaction_id: Uuid,
    pub bill_id: Uuid,
    pub student_id: Uuid,
    pub currency: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item joined with the status of its transaction
#[derive(Debug, Clone, FromRow)]
pub struct ItemWithStatusRow {
    #[sqlx(flatten)]
    pub item: ItemRow,
    pub transaction_status: PaymentStatus,
}

pub async fn insert(conn: &mut PgConnection, row: &TransactionRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_transactions (
            transaction_id, transaction_number, payer_id, currency, total_amount,
            method, paid_on, proof_reference, status, notes, recorded_by,
            verified_by, verified_at, cancelled_by, cancelled_at, cancellation_reason,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(row.transaction_id)
    .bind(&row.transaction_number)
    .bind(row.payer_id)
    .bind(&row.currency)
    .bind(row.total_amount)
    .bind(row.method)
    .bind(row.paid_on)
    .bind(&row.proof_reference)
    .bind(row.status)
    .bind(&row.notes)
    .bind(row.recorded_by)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    for_update: bool,
) -> Result<Option<TransactionRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM payment_transactions WHERE transaction_id = $1{}",
        TRANSACTION_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

pub async fn update(conn: &mut PgConnection, row: &TransactionRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE payment_transactions SET
            total_amount = $2,
            method = $3,
            paid_on = $4,
            proof_reference = $5,
            status = $6,
            notes = $7,
            verified_by = $8,
            verified_at = $9,
            cancelled_by = $10,
            cancelled_at = $11,
            cancellation_reason = $12,
            updated_at = $13
        WHERE transaction_id = $1
        "#,
    )
    .bind(row.transaction_id)
    .bind(row.total_amount)
    .bind(row.method)
    .bind(row.paid_on)
    .bind(&row.proof_reference)
    .bind(row.status)
    .bind(&row.notes)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.cancelled_by)
    .bind(row.cancelled_at)
    .bind(&row.cancellation_reason)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("PaymentTransaction", row.transaction_id));
    }
    Ok(())
}

pub async fn insert_item(conn: &mut PgConnection, row: &ItemRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_items (
            item_id, transaction_id, bill_id, student_id, currency, amount,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(row.item_id)
    .bind(row.transaction_id)
    .bind(row.bill_id)
    .bind(row.student_id)
    .bind(&row.currency)
    .bind(row.amount)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_item(
    conn: &mut PgConnection,
    item_id: Uuid,
) -> Result<Option<ItemRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM payment_items WHERE item_id = $1", ITEM_COLUMNS);

    let row = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(item_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Only the amount of an item can change; moving it to another bill is a
/// remove followed by an add
pub async fn update_item(conn: &mut PgConnection, row: &ItemRow) -> Result<(), DatabaseError> {
    let result =
        sqlx::query("UPDATE payment_items SET amount = $2, updated_at = $3 WHERE item_id = $1")
            .bind(row.item_id)
            .bind(row.amount)
            .bind(row.updated_at)
            .execute(conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("PaymentItem", row.item_id));
    }
    Ok(())
}

pub async fn delete_item(conn: &mut PgConnection, item_id: Uuid) -> Result<(), DatabaseError> {
    let result = sqlx::query("DELETE FROM payment_items WHERE item_id = $1")
        .bind(item_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("PaymentItem", item_id));
    }
    Ok(())
}

pub async fn items_for_transaction(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> Result<Vec<ItemRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM payment_items WHERE transaction_id = $1 ORDER BY created_at, item_id",
        ITEM_COLUMNS
    );

    let rows = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(transaction_id)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Items allocated to a bill together with their transaction's status
pub async fn items_for_bill(
    conn: &mut PgConnection,
    bill_id: Uuid,
) -> Result<Vec<ItemWithStatusRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, ItemWithStatusRow>(
        r#"
        SELECT
            i.item_id, i.transaction_id, i.bill_id, i.student_id, i.currency, i.amount,
            i.created_at, i.updated_at,
            t.status AS transaction_status
        FROM payment_items i
        JOIN payment_transactions t ON t.transaction_id = i.transaction_id
        WHERE i.bill_id = $1
        ORDER BY i.created_at, i.item_id
        "#,
    )
    .bind(bill_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}
