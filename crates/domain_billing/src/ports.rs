//! Ledger Ports
//!
//! The ledger talks to its store through a unit of work. [`LedgerPort::begin`]
//! opens a [`LedgerTx`]; every read and write of one operation, including
//! the cascaded recalculations, goes through that transaction and becomes
//! visible only on [`LedgerTx::commit`]. Dropping a transaction without
//! committing discards it.
//!
//! # Adapters
//!
//! - **Postgres Adapter**: `infra_db::PostgresLedgerAdapter`
//! - **Mock Adapter**: [`mock::MockLedgerPort`], in memory, for tests
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut tx = port.begin().await?;
//! let mut bill = tx.lock_bill(bill_id).await?;
//! // ... mutate, recalculate ...
//! tx.update_bill(&bill).await?;
//! tx.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    BillId, DomainPort, HealthCheckable, Money, PaymentId, PaymentItemId, PaymentTransactionId,
    PortError, ReconciliationBatchId, ReconciliationLineId,
};

use crate::bill::Bill;
use crate::numbering::SequenceKey;
use crate::payment::Payment;
use crate::reconciliation::{ReconciliationBatch, ReconciliationLine};
use crate::transaction::{ItemContribution, PaymentItem, PaymentTransaction};

/// Entry point to the ledger store
#[async_trait]
pub trait LedgerPort: DomainPort + HealthCheckable {
    /// Transaction type produced by this adapter
    type Tx: LedgerTx;

    /// Opens a unit of work
    async fn begin(&self) -> Result<Self::Tx, PortError>;
}

/// One atomic unit of work against the ledger store
///
/// `get_*` methods return `PortError::NotFound` for unknown ids. `lock_*`
/// methods additionally hold the row until commit so concurrent writers to
/// the same record serialize.
#[async_trait]
pub trait LedgerTx: Send {
    // ========================================================================
    // Bills
    // ========================================================================

    async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError>;

    async fn get_bill(&mut self, id: BillId) -> Result<Bill, PortError>;

    async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError>;

    async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError>;

    /// Non-deleted unpaid or partial bills due on or before `as_of`,
    /// ordered by due date
    async fn bills_due(&mut self, as_of: NaiveDate) -> Result<Vec<Bill>, PortError>;

    // ========================================================================
    // Legacy payments
    // ========================================================================

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    async fn get_payment(&mut self, id: PaymentId) -> Result<Payment, PortError>;

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Every payment recorded against the bill, deleted ones included
    async fn payments_for_bill(&mut self, bill_id: BillId) -> Result<Vec<Payment>, PortError>;

    /// Verified, non-deleted payments with one of `amounts` that no
    /// statement line references, ordered by id
    async fn unclaimed_payments(&mut self, amounts: &[Money]) -> Result<Vec<Payment>, PortError>;

    // ========================================================================
    // Payment transactions and items
    // ========================================================================

    async fn insert_transaction(
        &mut self,
        transaction: &PaymentTransaction,
    ) -> Result<(), PortError>;

    async fn get_transaction(
        &mut self,
        id: PaymentTransactionId,
    ) -> Result<PaymentTransaction, PortError>;

    async fn lock_transaction(
        &mut self,
        id: PaymentTransactionId,
    ) -> Result<PaymentTransaction, PortError>;

    async fn update_transaction(
        &mut self,
        transaction: &PaymentTransaction,
    ) -> Result<(), PortError>;

    async fn insert_item(&mut self, item: &PaymentItem) -> Result<(), PortError>;

    async fn get_item(&mut self, id: PaymentItemId) -> Result<PaymentItem, PortError>;

    async fn update_item(&mut self, item: &PaymentItem) -> Result<(), PortError>;

    async fn delete_item(&mut self, id: PaymentItemId) -> Result<(), PortError>;

    async fn items_for_transaction(
        &mut self,
        transaction_id: PaymentTransactionId,
    ) -> Result<Vec<PaymentItem>, PortError>;

    /// Items allocated to the bill, each with its transaction's status
    async fn items_for_bill(&mut self, bill_id: BillId) -> Result<Vec<ItemContribution>, PortError>;

    // ========================================================================
    // Document numbering
    // ========================================================================

    /// Advances the sequence and returns the new value, starting at 1
    async fn next_sequence(&mut self, key: SequenceKey) -> Result<u32, PortError>;

    // ========================================================================
    // Reconciliation
    // ========================================================================

    async fn insert_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError>;

    async fn get_batch(
        &mut self,
        id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, PortError>;

    async fn lock_batch(
        &mut self,
        id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, PortError>;

    async fn update_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError>;

    async fn insert_lines(&mut self, lines: &[ReconciliationLine]) -> Result<(), PortError>;

    /// Lines of the batch ordered by line number
    async fn lines_for_batch(
        &mut self,
        batch_id: ReconciliationBatchId,
    ) -> Result<Vec<ReconciliationLine>, PortError>;

    async fn get_line(&mut self, id: ReconciliationLineId) -> Result<ReconciliationLine, PortError>;

    /// Stores the line
    ///
    /// Fails with `PortError::Conflict` if another line already references
    /// the same payment.
    async fn update_line(&mut self, line: &ReconciliationLine) -> Result<(), PortError>;

    /// The line currently linked to the payment, in any batch
    async fn line_for_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Option<ReconciliationLine>, PortError>;

    // ========================================================================
    // Completion
    // ========================================================================

    /// Makes every write of this unit of work visible atomically
    async fn commit(self) -> Result<(), PortError>;
}

/// Mock implementation of LedgerPort for testing
///
/// State lives in memory behind one mutex. A transaction holds the lock for
/// its whole lifetime and works on a copy that replaces the shared state on
/// commit, which gives serializable isolation and rollback on drop.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use tokio::sync::{Mutex, OwnedMutexGuard};

    /// Everything the mock store holds
    #[derive(Debug, Clone, Default)]
    pub struct LedgerState {
        pub bills: BTreeMap<BillId, Bill>,
        pub payments: BTreeMap<PaymentId, Payment>,
        pub transactions: BTreeMap<PaymentTransactionId, PaymentTransaction>,
        pub items: BTreeMap<PaymentItemId, PaymentItem>,
        pub sequences: BTreeMap<SequenceKey, u32>,
        pub batches: BTreeMap<ReconciliationBatchId, ReconciliationBatch>,
        pub lines: BTreeMap<ReconciliationLineId, ReconciliationLine>,
    }

    /// In-memory mock implementation of LedgerPort
    #[derive(Debug, Default, Clone)]
    pub struct MockLedgerPort {
        state: Arc<Mutex<LedgerState>>,
        commit_conflicts: Arc<AtomicUsize>,
    }

    impl MockLedgerPort {
        /// Creates an empty mock store
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `count` commits fail with a conflict
        pub fn fail_next_commits(&self, count: usize) {
            self.commit_conflicts.store(count, Ordering::SeqCst);
        }

        /// Copy of the committed state
        pub async fn snapshot(&self) -> LedgerState {
            self.state.lock().await.clone()
        }
    }

    impl DomainPort for MockLedgerPort {}

    #[async_trait]
    impl HealthCheckable for MockLedgerPort {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-ledger-port".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerPort for MockLedgerPort {
        type Tx = MockLedgerTx;

        async fn begin(&self) -> Result<MockLedgerTx, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(MockLedgerTx {
                guard,
                working,
                commit_conflicts: self.commit_conflicts.clone(),
            })
        }
    }

    /// Unit of work over the mock store
    pub struct MockLedgerTx {
        guard: OwnedMutexGuard<LedgerState>,
        working: LedgerState,
        commit_conflicts: Arc<AtomicUsize>,
    }

    fn fetch<K: Ord + std::fmt::Display + Copy, V: Clone>(
        map: &BTreeMap<K, V>,
        entity: &str,
        id: K,
    ) -> Result<V, PortError> {
        map.get(&id).cloned().ok_or_else(|| PortError::not_found(entity, id))
    }

    fn replace<K: Ord + std::fmt::Display + Copy, V>(
        map: &mut BTreeMap<K, V>,
        entity: &str,
        id: K,
        value: V,
    ) -> Result<(), PortError> {
        match map.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PortError::not_found(entity, id)),
        }
    }

    fn insert_new<K: Ord + std::fmt::Display + Copy, V>(
        map: &mut BTreeMap<K, V>,
        entity: &str,
        id: K,
        value: V,
    ) -> Result<(), PortError> {
        if map.contains_key(&id) {
            return Err(PortError::conflict(format!("{} {} already exists", entity, id)));
        }
        map.insert(id, value);
        Ok(())
    }

    #[async_trait]
    impl LedgerTx for MockLedgerTx {
        async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
            insert_new(&mut self.working.bills, "Bill", bill.id, bill.clone())
        }

        async fn get_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
            fetch(&self.working.bills, "Bill", id)
        }

        async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
            fetch(&self.working.bills, "Bill", id)
        }

        async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
            replace(&mut self.working.bills, "Bill", bill.id, bill.clone())
        }

        async fn bills_due(&mut self, as_of: NaiveDate) -> Result<Vec<Bill>, PortError> {
            let mut due: Vec<Bill> = self
                .working
                .bills
                .values()
                .filter(|b| !b.is_deleted() && b.status.is_outstanding() && b.due_date <= as_of)
                .cloned()
                .collect();
            due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
            Ok(due)
        }

        async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
            if self.working.payments.values().any(|p| p.receipt_number == payment.receipt_number) {
                return Err(PortError::conflict(format!(
                    "Receipt number {} already used",
                    payment.receipt_number
                )));
            }
            insert_new(&mut self.working.payments, "Payment", payment.id, payment.clone())
        }

        async fn get_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
            fetch(&self.working.payments, "Payment", id)
        }

        async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
            fetch(&self.working.payments, "Payment", id)
        }

        async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
            replace(&mut self.working.payments, "Payment", payment.id, payment.clone())
        }

        async fn payments_for_bill(&mut self, bill_id: BillId) -> Result<Vec<Payment>, PortError> {
            Ok(self
                .working
                .payments
                .values()
                .filter(|p| p.bill_id == bill_id)
                .cloned()
                .collect())
        }

        async fn unclaimed_payments(
            &mut self,
            amounts: &[Money],
        ) -> Result<Vec<Payment>, PortError> {
            let claimed: Vec<PaymentId> = self
                .working
                .lines
                .values()
                .filter_map(|l| l.matched_payment_id())
                .collect();
            Ok(self
                .working
                .payments
                .values()
                .filter(|p| {
                    p.contributes() && amounts.contains(&p.amount) && !claimed.contains(&p.id)
                })
                .cloned()
                .collect())
        }

        async fn insert_transaction(
            &mut self,
            transaction: &PaymentTransaction,
        ) -> Result<(), PortError> {
            insert_new(
                &mut self.working.transactions,
                "PaymentTransaction",
                transaction.id,
                transaction.clone(),
            )
        }

        async fn get_transaction(
            &mut self,
            id: PaymentTransactionId,
        ) -> Result<PaymentTransaction, PortError> {
            fetch(&self.working.transactions, "PaymentTransaction", id)
        }

        async fn lock_transaction(
            &mut self,
            id: PaymentTransactionId,
        ) -> Result<PaymentTransaction, PortError> {
            fetch(&self.working.transactions, "PaymentTransaction", id)
        }

        async fn update_transaction(
            &mut self,
            transaction: &PaymentTransaction,
        ) -> Result<(), PortError> {
            replace(
                &mut self.working.transactions,
                "PaymentTransaction",
                transaction.id,
                transaction.clone(),
            )
        }

        async fn insert_item(&mut self, item: &PaymentItem) -> Result<(), PortError> {
            insert_new(&mut self.working.items, "PaymentItem", item.id, item.clone())
        }

        async fn get_item(&mut self, id: PaymentItemId) -> Result<PaymentItem, PortError> {
            fetch(&self.working.items, "PaymentItem", id)
        }

        async fn update_item(&mut self, item: &PaymentItem) -> Result<(), PortError> {
            replace(&mut self.working.items, "PaymentItem", item.id, item.clone())
        }

        async fn delete_item(&mut self, id: PaymentItemId) -> Result<(), PortError> {
            self.working
                .items
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("PaymentItem", id))
        }

        async fn items_for_transaction(
            &mut self,
            transaction_id: PaymentTransactionId,
        ) -> Result<Vec<PaymentItem>, PortError> {
            Ok(self
                .working
                .items
                .values()
                .filter(|i| i.transaction_id == transaction_id)
                .cloned()
                .collect())
        }

        async fn items_for_bill(
            &mut self,
            bill_id: BillId,
        ) -> Result<Vec<ItemContribution>, PortError> {
            self.working
                .items
                .values()
                .filter(|i| i.bill_id == bill_id)
                .map(|item| {
                    let transaction = fetch(
                        &self.working.transactions,
                        "PaymentTransaction",
                        item.transaction_id,
                    )?;
                    Ok(ItemContribution {
                        item: item.clone(),
                        transaction_status: transaction.status,
                    })
                })
                .collect()
        }

        async fn next_sequence(&mut self, key: SequenceKey) -> Result<u32, PortError> {
            let value = self.working.sequences.entry(key).or_insert(0);
            *value += 1;
            Ok(*value)
        }

        async fn insert_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError> {
            insert_new(&mut self.working.batches, "ReconciliationBatch", batch.id, batch.clone())
        }

        async fn get_batch(
            &mut self,
            id: ReconciliationBatchId,
        ) -> Result<ReconciliationBatch, PortError> {
            fetch(&self.working.batches, "ReconciliationBatch", id)
        }

        async fn lock_batch(
            &mut self,
            id: ReconciliationBatchId,
        ) -> Result<ReconciliationBatch, PortError> {
            fetch(&self.working.batches, "ReconciliationBatch", id)
        }

        async fn update_batch(&mut self, batch: &ReconciliationBatch) -> Result<(), PortError> {
            replace(&mut self.working.batches, "ReconciliationBatch", batch.id, batch.clone())
        }

        async fn insert_lines(&mut self, lines: &[ReconciliationLine]) -> Result<(), PortError> {
            for line in lines {
                insert_new(&mut self.working.lines, "ReconciliationLine", line.id, line.clone())?;
            }
            Ok(())
        }

        async fn lines_for_batch(
            &mut self,
            batch_id: ReconciliationBatchId,
        ) -> Result<Vec<ReconciliationLine>, PortError> {
            let mut lines: Vec<ReconciliationLine> = self
                .working
                .lines
                .values()
                .filter(|l| l.batch_id == batch_id)
                .cloned()
                .collect();
            lines.sort_by_key(|l| l.line_number);
            Ok(lines)
        }

        async fn get_line(
            &mut self,
            id: ReconciliationLineId,
        ) -> Result<ReconciliationLine, PortError> {
            fetch(&self.working.lines, "ReconciliationLine", id)
        }

        async fn update_line(&mut self, line: &ReconciliationLine) -> Result<(), PortError> {
            if let Some(payment_id) = line.matched_payment_id() {
                let taken = self
                    .working
                    .lines
                    .values()
                    .any(|other| {
                        other.id != line.id && other.matched_payment_id() == Some(payment_id)
                    });
                if taken {
                    return Err(PortError::conflict(format!(
                        "Payment {} is already linked to another line",
                        payment_id
                    )));
                }
            }
            replace(&mut self.working.lines, "ReconciliationLine", line.id, line.clone())
        }

        async fn line_for_payment(
            &mut self,
            payment_id: PaymentId,
        ) -> Result<Option<ReconciliationLine>, PortError> {
            Ok(self
                .working
                .lines
                .values()
                .find(|l| l.matched_payment_id() == Some(payment_id))
                .cloned())
        }

        async fn commit(mut self) -> Result<(), PortError> {
            let pending = self.commit_conflicts.load(Ordering::SeqCst);
            if pending > 0 {
                self.commit_conflicts.store(pending - 1, Ordering::SeqCst);
                return Err(PortError::conflict("Injected commit conflict"));
            }
            *self.guard = std::mem::take(&mut self.working);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockLedgerPort;
    use core_kernel::{AcademicYearId, Currency, FeeCategoryId, StudentId};
    use rust_decimal_macros::dec;

    use crate::bill::BillingPeriod;
    use crate::numbering::DocumentKind;

    fn bill() -> Bill {
        Bill::new(
            StudentId::new(),
            FeeCategoryId::new(),
            BillingPeriod::yearly(AcademicYearId::new()),
            Money::new(dec!(300000), Currency::IDR),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mock_port_commit_and_get() {
        let port = MockLedgerPort::new();
        let b = bill();

        let mut tx = port.begin().await.unwrap();
        tx.insert_bill(&b).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = port.begin().await.unwrap();
        assert_eq!(tx.get_bill(b.id).await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_mock_port_drop_rolls_back() {
        let port = MockLedgerPort::new();
        let b = bill();

        {
            let mut tx = port.begin().await.unwrap();
            tx.insert_bill(&b).await.unwrap();
        }

        let mut tx = port.begin().await.unwrap();
        let result = tx.get_bill(b.id).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_port_sequences_are_per_key() {
        let port = MockLedgerPort::new();
        let receipt_key = |m| {
            let date = NaiveDate::from_ymd_opt(2025, m, 3).unwrap();
            SequenceKey::for_date(DocumentKind::Receipt, date)
        };
        let (jan, feb) = (receipt_key(1), receipt_key(2));

        let mut tx = port.begin().await.unwrap();
        assert_eq!(tx.next_sequence(jan).await.unwrap(), 1);
        assert_eq!(tx.next_sequence(jan).await.unwrap(), 2);
        assert_eq!(tx.next_sequence(feb).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mock_port_injected_conflict() {
        let port = MockLedgerPort::new();
        port.fail_next_commits(1);

        let mut tx = port.begin().await.unwrap();
        tx.insert_bill(&bill()).await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_conflict());
        assert!(port.snapshot().await.bills.is_empty());
    }
}
