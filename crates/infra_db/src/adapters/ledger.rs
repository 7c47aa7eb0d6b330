//! PostgreSQL Ledger Adapter
//!
//! Implements the billing ledger's unit-of-work port on PostgreSQL. Each
//! [`PgLedgerTx`] wraps one `sqlx::Transaction`; `lock_*` reads take
//! `SELECT ... FOR UPDATE` row locks that are held until commit, and
//! dropping the transaction without committing rolls it back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_billing::LedgerService;
//! use core_kernel::Currency;
//! use std::sync::Arc;
//!
//! let adapter = PostgresLedgerAdapter::new(pool);
//! let service = LedgerService::new(Arc::new(adapter), Currency::IDR);
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, AcademicYearId, BillId, Currency, DomainPort, FeeCategoryId, GuardianId,
    HealthCheckResult, HealthCheckable, Money, PaymentId, PaymentItemId, PaymentTransactionId,
    PortError, ReconciliationBatchId, ReconciliationLineId, StudentId, UserId,
};
use domain_billing::ports::{LedgerPort, LedgerTx};
use domain_billing::{
    Bill, BillStatus, BillingPeriod, BatchStatus, Direction, DocumentKind, ItemContribution,
    LineMatch, Payment, PaymentItem, PaymentMethod, PaymentStatus, PaymentTransaction,
    ReconciliationBatch, ReconciliationLine, SequenceKey, StatementMetadata,
};

use crate::error::DatabaseError;
use crate::repositories::{bills, payments, reconciliation, sequences, transactions};
use crate::repositories::{BatchRow, BillRow, ItemRow, LineRow, PaymentRow, TransactionRow};

/// PostgreSQL-backed implementation of the ledger port
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - missing rows -> `PortError::NotFound`
/// - unique violations, serialization failures, deadlocks -> `PortError::Conflict`
/// - check violations -> `PortError::Validation`
/// - other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    pool: PgPool,
}

impl PostgresLedgerAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    /// Checks database connectivity with a `SELECT 1`
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: "postgres-ledger-adapter".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "postgres-ledger-adapter".to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LedgerPort for PostgresLedgerAdapter {
    type Tx = PgLedgerTx;

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<PgLedgerTx, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(PgLedgerTx { tx })
    }
}

/// One ledger unit of work on a PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    // ========================================================================
    // Bills
    // ========================================================================

    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
        bills::insert(&mut self.tx, &bill_to_row(bill)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    async fn get_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
        let row = bills::find(&mut self.tx, *id.as_uuid(), false)
            .await?
            .ok_or_else(|| PortError::not_found("Bill", id))?;
        row_to_bill(row)
    }

    #[instrument(skip(self), fields(bill_id = %id))]
    async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
        let row = bills::find(&mut self.tx, *id.as_uuid(), true)
            .await?
            .ok_or_else(|| PortError::not_found("Bill", id))?;
        row_to_bill(row)
    }

    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
        bills::update(&mut self.tx, &bill_to_row(bill)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn bills_due(&mut self, as_of: NaiveDate) -> Result<Vec<Bill>, PortError> {
        let rows = bills::due_on_or_before(&mut self.tx, as_of).await?;
        debug!(count = rows.len(), "Loaded outstanding bills");
        rows.into_iter().map(row_to_bill).collect()
    }

    // ========================================================================
    // Legacy payments
    // ========================================================================

    #[instrument(
        skip(self, payment),
        fields(payment_id = %payment.id, receipt = %payment.receipt_number)
    )]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        payments::insert(&mut self.tx, &payment_to_row(payment)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn get_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
        let row = payments::find(&mut self.tx, *id.as_uuid(), false)
            .await?
            .ok_or_else(|| PortError::not_found("Payment", id))?;
        row_to_payment(row)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
        let row = payments::find(&mut self.tx, *id.as_uuid(), true)
            .await?
            .ok_or_else(|| PortError::not_found("Payment", id))?;
        row_to_payment(row)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        payments::update(&mut self.tx, &payment_to_row(payment)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(bill_id = %bill_id))]
    async fn payments_for_bill(&mut self, bill_id: BillId) -> Result<Vec<Payment>, PortError> {
        let rows = payments::for_bill(&mut self.tx, *bill_id.as_uuid()).await?;
        rows.into_iter().map(row_to_payment).collect()
    }

    #[instrument(skip(self, amounts), fields(amounts = amounts.len()))]
    async fn unclaimed_payments(&mut self, amounts: &[Money]) -> Result<Vec<Payment>, PortError> {
        if amounts.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Decimal> = amounts.iter().map(|m| m.amount()).collect();
        let currencies: Vec<String> =
            amounts.iter().map(|m| m.currency().code().to_string()).collect();

        let rows = payments::unclaimed_with_amounts(&mut self.tx, &values, &currencies).await?;
        debug!(candidates = rows.len(), "Loaded unclaimed verified payments");
        rows.into_iter().map(row_to_payment).collect()
    }

    // ========================================================================
    // Payment transactions and items
    // ========================================================================

    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    async fn insert_transaction(
        &mut self,
        transaction: &PaymentTransaction,
    ) -> Result<(), PortError> {
        transactions::insert(&mut self.tx, &transaction_to_row(transaction)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn get_transaction(
        &mut self,
        id: PaymentTransactionId,
    ) -> Result<PaymentTransaction, PortError> {
        let row = transactions::find(&mut self.tx, *id.as_uuid(), false)
            .await?
            .ok_or_else(|| PortError::not_found("PaymentTransaction", id))?;
        row_to_transaction(row)
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn lock_transaction(
        &mut self,
        id: PaymentTransactionId,
    ) -> Result<PaymentTransaction, PortError> {
        let row = transactions::find(&mut self.tx, *id.as_uuid(), true)
            .await?
            .ok_or_else(|| PortError::not_found("PaymentTransaction", id))?;
        row_to_transaction(row)
    }

    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    async fn update_transaction(
        &mut self,
        transaction: &PaymentTransaction,
    ) -> Result<(), PortError> {
        transactions::update(&mut self.tx, &transaction_to_row(transaction)).await?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, bill_id = %item.bill_id))]
    async fn insert_item(&mut self, item: &PaymentItem) -> Result<(), PortError> {
        transactions::insert_item(&mut self.tx, &item_to_row(item)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn get_item(&mut self, id: PaymentItemId) -> Result<PaymentItem, PortError> {
        let row = transactions::find_item(&mut self.tx, *id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("PaymentItem", id))?;
        row_to_item(row)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn update_item(&mut self, item: &PaymentItem) -> Result<(), PortError> {
        transactions::update_item(&mut self.tx, &item_to_row(item)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn delete_item(&mut self, id: PaymentItemId) -> Result<(), PortError> {
        transactions::delete_item(&mut self.tx, *id.as_uuid())
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => PortError::not_found("PaymentItem", id),
                other => other.into(),
            })
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn items_for_transaction(
        &mut self,
        transaction_id: PaymentTransactionId,
    ) -> Result<Vec<PaymentItem>, PortError> {
        let rows =
            transactions::items_for_transaction(&mut self.tx, *transaction_id.as_uuid()).await?;
        rows.into_iter().map(row_to_item).collect()
    }

    #[instrument(skip(self), fields(bill_id = %bill_id))]
    async fn items_for_bill(
        &mut self,
        bill_id: BillId,
    ) -> Result<Vec<ItemContribution>, PortError> {
        let rows = transactions::items_for_bill(&mut self.tx, *bill_id.as_uuid()).await?;
        rows.into_iter()
            .map(|row| {
                Ok(ItemContribution {
                    item: row_to_item(row.item)?,
                    transaction_status: db_to_domain_payment_status(row.transaction_status),
                })
            })
            .collect()
    }

    // ========================================================================
    // Document numbering
    // ========================================================================

    #[instrument(skip(self), fields(kind = key.kind.as_str(), year = key.year, month = key.month))]
    async fn next_sequence(&mut self, key: SequenceKey) -> Result<u32, PortError> {
        let kind = match key.kind {
            DocumentKind::Receipt => sequences::DocumentKind::Receipt,
            DocumentKind::Transaction => sequences::DocumentKind::Transaction,
        };
        let month = i16::try_from(key.month)
            .map_err(|_| PortError::validation(format!("Invalid sequence month {}", key.month)))?;

        let value = sequences::next_value(&mut self.tx, kind, key.year, month).await?;
        to_count(value, "document_sequences.last_value")
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    #[instrument(skip(self, batch), fields(batch_id = %batch.id))]
    async fn insert_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError> {
        reconciliation::insert_batch(&mut self.tx, &batch_to_row(batch)?).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(batch_id = %id))]
    async fn get_batch(
        &mut self,
        id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, PortError> {
        let row = reconciliation::find_batch(&mut self.tx, *id.as_uuid(), false)
            .await?
            .ok_or_else(|| PortError::not_found("ReconciliationBatch", id))?;
        row_to_batch(row)
    }

    #[instrument(skip(self), fields(batch_id = %id))]
    async fn lock_batch(
        &mut self,
        id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, PortError> {
        let row = reconciliation::find_batch(&mut self.tx, *id.as_uuid(), true)
            .await?
            .ok_or_else(|| PortError::not_found("ReconciliationBatch", id))?;
        row_to_batch(row)
    }

    #[instrument(skip(self, batch), fields(batch_id = %batch.id, status = %batch.status))]
    async fn update_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError> {
        reconciliation::update_batch(&mut self.tx, &batch_to_row(batch)?).await?;
        Ok(())
    }

    #[instrument(skip(self, lines), fields(count = lines.len()))]
    async fn insert_lines(&mut self, lines: &[ReconciliationLine]) -> Result<(), PortError> {
        for line in lines {
            reconciliation::insert_line(&mut self.tx, &line_to_row(line)?).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(batch_id = %batch_id))]
    async fn lines_for_batch(
        &mut self,
        batch_id: ReconciliationBatchId,
    ) -> Result<Vec<ReconciliationLine>, PortError> {
        let rows = reconciliation::lines_for_batch(&mut self.tx, *batch_id.as_uuid()).await?;
        rows.into_iter().map(row_to_line).collect()
    }

    #[instrument(skip(self), fields(line_id = %id))]
    async fn get_line(
        &mut self,
        id: ReconciliationLineId,
    ) -> Result<ReconciliationLine, PortError> {
        let row = reconciliation::find_line(&mut self.tx, *id.as_uuid())
            .await?
            .ok_or_else(|| PortError::not_found("ReconciliationLine", id))?;
        row_to_line(row)
    }

    #[instrument(skip(self, line), fields(line_id = %line.id, match_type = ?line.match_type()))]
    async fn update_line(&mut self, line: &ReconciliationLine) -> Result<(), PortError> {
        reconciliation::update_line_match(&mut self.tx, &line_to_row(line)?)
            .await
            .map_err(|e| match e {
                DatabaseError::DuplicateEntry(_) => PortError::conflict(format!(
                    "Payment {} is already linked to another line",
                    line.matched_payment_id().map(|p| p.to_string()).unwrap_or_default()
                )),
                other => other.into(),
            })
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn line_for_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Option<ReconciliationLine>, PortError> {
        reconciliation::line_for_payment(&mut self.tx, *payment_id.as_uuid())
            .await?
            .map(row_to_line)
            .transpose()
    }

    // ========================================================================
    // Completion
    // ========================================================================

    #[instrument(skip(self))]
    async fn commit(self) -> Result<(), PortError> {
        self.tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}

// ============================================================================
// Row <-> domain conversions
// ============================================================================

fn currency_of(code: &str) -> Result<Currency, PortError> {
    Currency::from_str(code)
        .map_err(|e| PortError::internal(format!("Stored currency is invalid: {}", e)))
}

fn to_count(value: i32, column: &str) -> Result<u32, PortError> {
    u32::try_from(value)
        .map_err(|_| PortError::internal(format!("Negative value {} in {}", value, column)))
}

fn from_count(value: u32, column: &str) -> Result<i32, PortError> {
    i32::try_from(value)
        .map_err(|_| PortError::validation(format!("Value {} too large for {}", value, column)))
}

fn bill_to_row(bill: &Bill) -> BillRow {
    BillRow {
        bill_id: *bill.id.as_uuid(),
        student_id: *bill.student_id.as_uuid(),
        category_id: *bill.category_id.as_uuid(),
        academic_year_id: *bill.period.academic_year_id.as_uuid(),
        // BillingPeriod guarantees 1..=12
        period_month: bill.period.month.map(|m| m as i16),
        currency: bill.currency().code().to_string(),
        amount_due: bill.amount_due.amount(),
        amount_paid: bill.amount_paid.amount(),
        status: match bill.status {
            BillStatus::Unpaid => bills::BillStatus::Unpaid,
            BillStatus::Partial => bills::BillStatus::Partial,
            BillStatus::Paid => bills::BillStatus::Paid,
            BillStatus::Cancelled => bills::BillStatus::Cancelled,
        },
        due_date: bill.due_date,
        cancelled_by: bill.cancelled_by.map(Into::into),
        cancelled_at: bill.cancelled_at,
        cancellation_reason: bill.cancellation_reason.clone(),
        deleted_at: bill.deleted_at,
        deleted_by: bill.deleted_by.map(Into::into),
        created_at: bill.created_at,
        updated_at: bill.updated_at,
    }
}

fn row_to_bill(row: BillRow) -> Result<Bill, PortError> {
    let currency = currency_of(&row.currency)?;
    let month = row
        .period_month
        .map(|m| {
            u32::try_from(m)
                .map_err(|_| PortError::internal(format!("Invalid period month {}", m)))
        })
        .transpose()?;

    Ok(Bill {
        id: BillId::from_uuid(row.bill_id),
        student_id: StudentId::from_uuid(row.student_id),
        category_id: FeeCategoryId::from_uuid(row.category_id),
        period: BillingPeriod {
            academic_year_id: AcademicYearId::from_uuid(row.academic_year_id),
            month,
        },
        amount_due: Money::new(row.amount_due, currency),
        amount_paid: Money::new(row.amount_paid, currency),
        status: match row.status {
            bills::BillStatus::Unpaid => BillStatus::Unpaid,
            bills::BillStatus::Partial => BillStatus::Partial,
            bills::BillStatus::Paid => BillStatus::Paid,
            bills::BillStatus::Cancelled => BillStatus::Cancelled,
        },
        due_date: row.due_date,
        cancelled_by: row.cancelled_by.map(UserId::from_uuid),
        cancelled_at: row.cancelled_at,
        cancellation_reason: row.cancellation_reason,
        deleted_at: row.deleted_at,
        deleted_by: row.deleted_by.map(UserId::from_uuid),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn domain_to_db_method(method: PaymentMethod) -> payments::PaymentMethod {
    match method {
        PaymentMethod::Cash => payments::PaymentMethod::Cash,
        PaymentMethod::BankTransfer => payments::PaymentMethod::BankTransfer,
        PaymentMethod::VirtualAccount => payments::PaymentMethod::VirtualAccount,
        PaymentMethod::Qris => payments::PaymentMethod::Qris,
        PaymentMethod::EWallet => payments::PaymentMethod::EWallet,
    }
}

fn db_to_domain_method(method: payments::PaymentMethod) -> PaymentMethod {
    match method {
        payments::PaymentMethod::Cash => PaymentMethod::Cash,
        payments::PaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
        payments::PaymentMethod::VirtualAccount => PaymentMethod::VirtualAccount,
        payments::PaymentMethod::Qris => PaymentMethod::Qris,
        payments::PaymentMethod::EWallet => PaymentMethod::EWallet,
    }
}

fn domain_to_db_payment_status(status: PaymentStatus) -> payments::PaymentStatus {
    match status {
        PaymentStatus::Pending => payments::PaymentStatus::Pending,
        PaymentStatus::Verified => payments::PaymentStatus::Verified,
        PaymentStatus::Cancelled => payments::PaymentStatus::Cancelled,
    }
}

fn db_to_domain_payment_status(status: payments::PaymentStatus) -> PaymentStatus {
    match status {
        payments::PaymentStatus::Pending => PaymentStatus::Pending,
        payments::PaymentStatus::Verified => PaymentStatus::Verified,
        payments::PaymentStatus::Cancelled => PaymentStatus::Cancelled,
    }
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        payment_id: *payment.id.as_uuid(),
        receipt_number: payment.receipt_number.clone(),
        bill_id: *payment.bill_id.as_uuid(),
        student_id: *payment.student_id.as_uuid(),
        currency: payment.amount.currency().code().to_string(),
        amount: payment.amount.amount(),
        method: domain_to_db_method(payment.method),
        paid_on: payment.paid_on,
        status: domain_to_db_payment_status(payment.status),
        notes: payment.notes.clone(),
        recorded_by: *payment.recorded_by.as_uuid(),
        verified_by: payment.verified_by.map(Into::into),
        verified_at: payment.verified_at,
        cancelled_by: payment.cancelled_by.map(Into::into),
        cancelled_at: payment.cancelled_at,
        cancellation_reason: payment.cancellation_reason.clone(),
        deleted_at: payment.deleted_at,
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PortError> {
    let currency = currency_of(&row.currency)?;

    Ok(Payment {
        id: PaymentId::from_uuid(row.payment_id),
        receipt_number: row.receipt_number,
        bill_id: BillId::from_uuid(row.bill_id),
        student_id: StudentId::from_uuid(row.student_id),
        amount: Money::new(row.amount, currency),
        method: db_to_domain_method(row.method),
        paid_on: row.paid_on,
        status: db_to_domain_payment_status(row.status),
        notes: row.notes,
        recorded_by: UserId::from_uuid(row.recorded_by),
        verified_by: row.verified_by.map(UserId::from_uuid),
        verified_at: row.verified_at,
        cancelled_by: row.cancelled_by.map(UserId::from_uuid),
        cancelled_at: row.cancelled_at,
        cancellation_reason: row.cancellation_reason,
        deleted_at: row.deleted_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn transaction_to_row(transaction: &PaymentTransaction) -> TransactionRow {
    TransactionRow {
        transaction_id: *transaction.id.as_uuid(),
        transaction_number: transaction.transaction_number.clone(),
        payer_id: *transaction.payer_id.as_uuid(),
        currency: transaction.currency().code().to_string(),
        total_amount: transaction.total_amount.amount(),
        method: domain_to_db_method(transaction.method),
        paid_on: transaction.paid_on,
        proof_reference: transaction.proof_reference.clone(),
        status: domain_to_db_payment_status(transaction.status),
        notes: transaction.notes.clone(),
        recorded_by: *transaction.recorded_by.as_uuid(),
        verified_by: transaction.verified_by.map(Into::into),
        verified_at: transaction.verified_at,
        cancelled_by: transaction.cancelled_by.map(Into::into),
        cancelled_at: transaction.cancelled_at,
        cancellation_reason: transaction.cancellation_reason.clone(),
        created_at: transaction.created_at,
        updated_at: transaction.updated_at,
    }
}

fn row_to_transaction(row: TransactionRow) -> Result<PaymentTransaction, PortError> {
    let currency = currency_of(&row.currency)?;

    Ok(PaymentTransaction {
        id: PaymentTransactionId::from_uuid(row.transaction_id),
        transaction_number: row.transaction_number,
        payer_id: GuardianId::from_uuid(row.payer_id),
        total_amount: Money::new(row.total_amount, currency),
        method: db_to_domain_method(row.method),
        paid_on: row.paid_on,
        proof_reference: row.proof_reference,
        status: db_to_domain_payment_status(row.status),
        notes: row.notes,
        recorded_by: UserId::from_uuid(row.recorded_by),
        verified_by: row.verified_by.map(UserId::from_uuid),
        verified_at: row.verified_at,
        cancelled_by: row.cancelled_by.map(UserId::from_uuid),
        cancelled_at: row.cancelled_at,
        cancellation_reason: row.cancellation_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn item_to_row(item: &PaymentItem) -> ItemRow {
    ItemRow {
        item_id: *item.id.as_uuid(),
        transaction_id: *item.transaction_id.as_uuid(),
        bill_id: *item.bill_id.as_uuid(),
        student_id: *item.student_id.as_uuid(),
        currency: item.amount.currency().code().to_string(),
        amount: item.amount.amount(),
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

fn row_to_item(row: ItemRow) -> Result<PaymentItem, PortError> {
    let currency = currency_of(&row.currency)?;

    Ok(PaymentItem {
        id: PaymentItemId::from_uuid(row.item_id),
        transaction_id: PaymentTransactionId::from_uuid(row.transaction_id),
        bill_id: BillId::from_uuid(row.bill_id),
        student_id: StudentId::from_uuid(row.student_id),
        amount: Money::new(row.amount, currency),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn batch_to_row(batch: &ReconciliationBatch) -> Result<BatchRow, PortError> {
    Ok(BatchRow {
        batch_id: *batch.id.as_uuid(),
        file_name: batch.metadata.file_name.clone(),
        file_reference: batch.metadata.file_reference.clone(),
        bank_account: batch.metadata.bank_account.clone(),
        period_start: batch.metadata.period_start,
        period_end: batch.metadata.period_end,
        currency: batch.currency.code().to_string(),
        total_transactions: from_count(batch.total_transactions, "total_transactions")?,
        total_amount: batch.total_amount.amount(),
        matched_count: from_count(batch.matched_count, "matched_count")?,
        matched_amount: batch.matched_amount.amount(),
        unmatched_count: from_count(batch.unmatched_count, "unmatched_count")?,
        status: match batch.status {
            BatchStatus::Draft => reconciliation::BatchStatus::Draft,
            BatchStatus::Processing => reconciliation::BatchStatus::Processing,
            BatchStatus::Completed => reconciliation::BatchStatus::Completed,
            BatchStatus::Verified => reconciliation::BatchStatus::Verified,
        },
        uploaded_by: *batch.uploaded_by.as_uuid(),
        verified_by: batch.verified_by.map(Into::into),
        verified_at: batch.verified_at,
        created_at: batch.created_at,
        updated_at: batch.updated_at,
    })
}

fn row_to_batch(row: BatchRow) -> Result<ReconciliationBatch, PortError> {
    let currency = currency_of(&row.currency)?;

    Ok(ReconciliationBatch {
        id: ReconciliationBatchId::from_uuid(row.batch_id),
        metadata: StatementMetadata {
            file_name: row.file_name,
            file_reference: row.file_reference,
            bank_account: row.bank_account,
            period_start: row.period_start,
            period_end: row.period_end,
        },
        currency,
        total_transactions: to_count(row.total_transactions, "total_transactions")?,
        total_amount: Money::new(row.total_amount, currency),
        matched_count: to_count(row.matched_count, "matched_count")?,
        matched_amount: Money::new(row.matched_amount, currency),
        unmatched_count: to_count(row.unmatched_count, "unmatched_count")?,
        status: match row.status {
            reconciliation::BatchStatus::Draft => BatchStatus::Draft,
            reconciliation::BatchStatus::Processing => BatchStatus::Processing,
            reconciliation::BatchStatus::Completed => BatchStatus::Completed,
            reconciliation::BatchStatus::Verified => BatchStatus::Verified,
        },
        uploaded_by: UserId::from_uuid(row.uploaded_by),
        verified_by: row.verified_by.map(UserId::from_uuid),
        verified_at: row.verified_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn line_to_row(line: &ReconciliationLine) -> Result<LineRow, PortError> {
    let state = &line.match_state;
    let (match_type, matched_payment_id, confidence, matched_by, matched_at) = match state {
        LineMatch::Unmatched => (reconciliation::MatchType::Unmatched, None, None, None, None),
        LineMatch::Auto {
            payment_id,
            confidence,
            matched_at,
        } => (
            reconciliation::MatchType::Auto,
            Some(*payment_id.as_uuid()),
            Some(*confidence),
            None,
            Some(*matched_at),
        ),
        LineMatch::Manual {
            payment_id,
            matched_by,
            matched_at,
        } => (
            reconciliation::MatchType::Manual,
            Some(*payment_id.as_uuid()),
            None,
            Some(*matched_by.as_uuid()),
            Some(*matched_at),
        ),
    };

    Ok(LineRow {
        line_id: *line.id.as_uuid(),
        batch_id: *line.batch_id.as_uuid(),
        line_number: from_count(line.line_number, "line_number")?,
        transaction_date: line.transaction_date,
        description: line.description.clone(),
        currency: line.amount.currency().code().to_string(),
        amount: line.amount.amount(),
        direction: match line.direction {
            Direction::Credit => reconciliation::LineDirection::Credit,
            Direction::Debit => reconciliation::LineDirection::Debit,
        },
        reference: line.reference.clone(),
        match_type,
        matched_payment_id,
        confidence,
        matched_by,
        matched_at,
        created_at: line.created_at,
        updated_at: line.updated_at,
    })
}

fn row_to_line(row: LineRow) -> Result<ReconciliationLine, PortError> {
    let currency = currency_of(&row.currency)?;
    let corrupt =
        || PortError::internal(format!("Line {} has an incomplete match record", row.line_id));

    let match_state = match row.match_type {
        reconciliation::MatchType::Unmatched => LineMatch::Unmatched,
        reconciliation::MatchType::Auto => LineMatch::Auto {
            payment_id: PaymentId::from_uuid(row.matched_payment_id.ok_or_else(corrupt)?),
            confidence: row.confidence.ok_or_else(corrupt)?,
            matched_at: row.matched_at.ok_or_else(corrupt)?,
        },
        reconciliation::MatchType::Manual => LineMatch::Manual {
            payment_id: PaymentId::from_uuid(row.matched_payment_id.ok_or_else(corrupt)?),
            matched_by: UserId::from_uuid(row.matched_by.ok_or_else(corrupt)?),
            matched_at: row.matched_at.ok_or_else(corrupt)?,
        },
    };

    Ok(ReconciliationLine {
        id: ReconciliationLineId::from_uuid(row.line_id),
        batch_id: ReconciliationBatchId::from_uuid(row.batch_id),
        line_number: to_count(row.line_number, "line_number")?,
        transaction_date: row.transaction_date,
        description: row.description,
        amount: Money::new(row.amount, currency),
        direction: match row.direction {
            reconciliation::LineDirection::Credit => Direction::Credit,
            reconciliation::LineDirection::Debit => Direction::Debit,
        },
        reference: row.reference,
        match_state,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
