//! Monthly document counters
//!
//! The upsert takes a row lock on the counter, so two writers numbering
//! documents in the same month queue behind each other until commit and
//! never hand out the same number.

use sqlx::PgConnection;

use crate::error::DatabaseError;

/// Database enum for the numbered document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "document_kind", rename_all = "snake_case")]
pub enum DocumentKind {
    Receipt,
    Transaction,
}

/// Advances the counter for (kind, year, month) and returns the new value
pub async fn next_value(
    conn: &mut PgConnection,
    kind: DocumentKind,
    year: i32,
    month: i16,
) -> Result<i32, DatabaseError> {
    let value = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO document_sequences (kind, year, month, last_value)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (kind, year, month)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind)
    .bind(year)
    .bind(month)
    .fetch_one(conn)
    .await?;

    Ok(value)
}
