//! Reconciliation batch and statement line repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::DatabaseError;

const BATCH_COLUMNS: &str = r#"
    batch_id, file_name, file_reference, bank_account, period_start, period_end,
    currency, total_transactions, total_amount, matched_count, matched_amount,
    unmatched_count, status, uploaded_by, verified_by, verified_at,
    created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    line_id, batch_id, line_number, transaction_date, description, currency,
    amount, direction, reference, match_type, matched_payment_id, confidence,
    matched_by, matched_at, created_at, updated_at
"#;

/// Database row for an imported bank statement
#[derive(Debug, Clone, FromRow)]
pub struct BatchRow {
    pub batch_id: Uuid,
    pub file_name: String,
    pub file_reference: Option<String>,
    pub bank_account: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    pub total_transactions: i32,
    pub total_amount: Decimal,
    pub matched_count: i32,
    pub matched_amount: Decimal,
    pub unmatched_count: i32,
    pub status: BatchStatus,
    pub uploaded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for one statement line and its match
#[derive(Debug, Clone, FromRow)]
pub struct LineRow {
    pub line_id: Uuid,
    pub batch_id: Uuid,
    pub line_number: i32,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub currency: String,
    pub amount: Decimal,
    pub direction: LineDirection,
    pub reference: Option<String>,
    pub match_type: MatchType,
    pub matched_payment_id: Option<Uuid>,
    pub confidence: Option<Decimal>,
    pub matched_by: Option<Uuid>,
    pub matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "batch_status", rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Processing,
    Completed,
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "line_direction", rename_all = "snake_case")]
pub enum LineDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "snake_case")]
pub enum MatchType {
    Auto,
    Manual,
    Unmatched,
}

pub async fn insert_batch(conn: &mut PgConnection, row: &BatchRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO reconciliation_batches (
            batch_id, file_name, file_reference, bank_account, period_start, period_end,
            currency, total_transactions, total_amount, matched_count, matched_amount,
            unmatched_count, status, uploaded_by, verified_by, verified_at,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(row.batch_id)
    .bind(&row.file_name)
    .bind(&row.file_reference)
    .bind(&row.bank_account)
    .bind(row.period_start)
    .bind(row.period_end)
    .bind(&row.currency)
    .bind(row.total_transactions)
    .bind(row.total_amount)
    .bind(row.matched_count)
    .bind(row.matched_amount)
    .bind(row.unmatched_count)
    .bind(row.status)
    .bind(row.uploaded_by)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_batch(
    conn: &mut PgConnection,
    batch_id: Uuid,
    for_update: bool,
) -> Result<Option<BatchRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM reconciliation_batches WHERE batch_id = $1{}",
        BATCH_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );

    let row = sqlx::query_as::<_, BatchRow>(&sql)
        .bind(batch_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Writes back the counters, status and verification stamp
pub async fn update_batch(conn: &mut PgConnection, row: &BatchRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE reconciliation_batches SET
            total_transactions = $2,
            total_amount = $3,
            matched_count = $4,
            matched_amount = $5,
            unmatched_count = $6,
            status = $7,
            verified_by = $8,
            verified_at = $9,
            updated_at = $10
        WHERE batch_id = $1
        "#,
    )
    .bind(row.batch_id)
    .bind(row.total_transactions)
    .bind(row.total_amount)
    .bind(row.matched_count)
    .bind(row.matched_amount)
    .bind(row.unmatched_count)
    .bind(row.status)
    .bind(row.verified_by)
    .bind(row.verified_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("ReconciliationBatch", row.batch_id));
    }
    Ok(())
}

pub async fn insert_line(conn: &mut PgConnection, row: &LineRow) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO reconciliation_lines (
            line_id, batch_id, line_number, transaction_date, description, currency,
            amount, direction, reference, match_type, matched_payment_id, confidence,
            matched_by, matched_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(row.line_id)
    .bind(row.batch_id)
    .bind(row.line_number)
    .bind(row.transaction_date)
    .bind(&row.description)
    .bind(&row.currency)
    .bind(row.amount)
    .bind(row.direction)
    .bind(&row.reference)
    .bind(row.match_type)
    .bind(row.matched_payment_id)
    .bind(row.confidence)
    .bind(row.matched_by)
    .bind(row.matched_at)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn lines_for_batch(
    conn: &mut PgConnection,
    batch_id: Uuid,
) -> Result<Vec<LineRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM reconciliation_lines WHERE batch_id = $1 ORDER BY line_number",
        LINE_COLUMNS
    );

    let rows = sqlx::query_as::<_, LineRow>(&sql)
        .bind(batch_id)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

pub async fn find_line(
    conn: &mut PgConnection,
    line_id: Uuid,
) -> Result<Option<LineRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM reconciliation_lines WHERE line_id = $1", LINE_COLUMNS);

    let row = sqlx::query_as::<_, LineRow>(&sql)
        .bind(line_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Writes back the match columns of a line
///
/// Linking a payment that another line already holds trips the partial
/// unique index on `matched_payment_id` and surfaces as a duplicate entry.
pub async fn update_line_match(
    conn: &mut PgConnection,
    row: &LineRow,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE reconciliation_lines SET
            match_type = $2,
            matched_payment_id = $3,
            confidence = $4,
            matched_by = $5,
            matched_at = $6,
            updated_at = $7
        WHERE line_id = $1
        "#,
    )
    .bind(row.line_id)
    .bind(row.match_type)
    .bind(row.matched_payment_id)
    .bind(row.confidence)
    .bind(row.matched_by)
    .bind(row.matched_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("ReconciliationLine", row.line_id));
    }
    Ok(())
}

pub async fn line_for_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Option<LineRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM reconciliation_lines WHERE matched_payment_id = $1",
        LINE_COLUMNS
    );

    let row = sqlx::query_as::<_, LineRow>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}
