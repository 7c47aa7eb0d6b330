//! Ledger application service
//!
//! Every mutating operation opens one unit of work, performs the change and
//! all the recalculations it implies, and commits once. Nothing is
//! recalculated implicitly: each method lists its cascade.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    BillId, Currency, FeeCategoryId, GuardianId, Money, PaymentId, PaymentItemId,
    PaymentTransactionId, ReconciliationBatchId, ReconciliationLineId, StudentId, UserId,
};

use crate::bill::{Bill, BillingPeriod};
use crate::error::BillingError;
use crate::matcher::{self, CandidateScore, MatchingPolicy};
use crate::numbering::{DocumentKind, SequenceKey};
use crate::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::ports::{LedgerPort, LedgerTx};
use crate::recalculation;
use crate::reconciliation::{
    ReconciliationBatch, ReconciliationLine, StatementLineInput, StatementMetadata,
};
use crate::transaction::{PaymentItem, PaymentTransaction};

/// Attempts made before a lost race on a payment link is reported
const MAX_CONFLICT_ATTEMPTS: usize = 3;

/// The billing ledger
pub struct LedgerService<P: LedgerPort> {
    port: Arc<P>,
    currency: Currency,
    policy: MatchingPolicy,
}

impl<P: LedgerPort> Clone for LedgerService<P> {
    fn clone(&self) -> Self {
        Self {
            port: self.port.clone(),
            currency: self.currency,
            policy: self.policy,
        }
    }
}

impl<P: LedgerPort> LedgerService<P> {
    /// Creates a service over `port` with the default matching policy
    pub fn new(port: Arc<P>, currency: Currency) -> Self {
        Self {
            port,
            currency,
            policy: MatchingPolicy::default(),
        }
    }

    /// Replaces the matching policy
    pub fn with_policy(mut self, policy: MatchingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn port(&self) -> &Arc<P> {
        &self.port
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    // ========================================================================
    // Bills
    // ========================================================================

    /// Creates an unpaid bill
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn create_bill(
        &self,
        student_id: StudentId,
        category_id: FeeCategoryId,
        period: BillingPeriod,
        amount_due: Money,
        due_date: NaiveDate,
    ) -> Result<Bill, BillingError> {
        self.ensure_currency(&amount_due)?;
        let bill = Bill::new(student_id, category_id, period, amount_due, due_date)?;

        let mut tx = self.port.begin().await?;
        tx.insert_bill(&bill).await?;
        tx.commit().await?;

        info!(bill_id = %bill.id, amount_due = %bill.amount_due, "bill created");
        Ok(bill)
    }

    pub async fn get_bill(&self, bill_id: BillId) -> Result<Bill, BillingError> {
        let mut tx = self.port.begin().await?;
        Ok(tx.get_bill(bill_id).await?)
    }

    /// Cancels a bill; its paid amount is frozen from then on
    #[instrument(skip(self, reason), fields(bill_id = %bill_id, actor = %actor))]
    pub async fn cancel_bill(
        &self,
        bill_id: BillId,
        reason: &str,
        actor: UserId,
    ) -> Result<Bill, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut bill = tx.lock_bill(bill_id).await?;
        bill.cancel(reason, actor).inspect_err(|e| warn!(error = %e, "bill cancel rejected"))?;
        tx.update_bill(&bill).await?;
        tx.commit().await?;

        info!("bill cancelled");
        Ok(bill)
    }

    /// Soft-deletes a bill that nothing has been paid or is pending against
    #[instrument(skip(self), fields(bill_id = %bill_id, actor = %actor))]
    pub async fn delete_bill(&self, bill_id: BillId, actor: UserId) -> Result<Bill, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut bill = tx.lock_bill(bill_id).await?;

        let payments = tx.payments_for_bill(bill_id).await?;
        let items = tx.items_for_bill(bill_id).await?;
        let live_payment = payments
            .iter()
            .any(|p| p.deleted_at.is_none() && p.status != PaymentStatus::Cancelled);
        let live_item = items
            .iter()
            .any(|c| c.transaction_status != PaymentStatus::Cancelled);
        if live_payment || live_item {
            warn!("bill delete rejected: payments still attached");
            return Err(BillingError::validation(
                "Bill has verified or pending payments and cannot be deleted",
            ));
        }

        bill.soft_delete(actor)?;
        tx.update_bill(&bill).await?;
        tx.commit().await?;

        info!("bill deleted");
        Ok(bill)
    }

    /// Re-derives a bill's paid amount and status
    #[instrument(skip(self), fields(bill_id = %bill_id))]
    pub async fn recalculate_bill(&self, bill_id: BillId) -> Result<Bill, BillingError> {
        let mut tx = self.port.begin().await?;
        let bill = recalculate_in(&mut tx, bill_id).await?;
        tx.commit().await?;
        Ok(bill)
    }

    /// Outstanding bills due on or before `as_of`, for the reminder dispatcher
    #[instrument(skip(self))]
    pub async fn bills_due_for_reminder(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<Bill>, BillingError> {
        let mut tx = self.port.begin().await?;
        let bills = tx.bills_due(as_of).await?;
        debug!(count = bills.len(), "bills due");
        Ok(bills)
    }

    // ========================================================================
    // Legacy payments
    // ========================================================================

    /// Records a pending payment against one bill
    #[instrument(skip(self), fields(bill_id = %bill_id, recorded_by = %recorded_by))]
    pub async fn record_legacy_payment(
        &self,
        bill_id: BillId,
        amount: Money,
        method: PaymentMethod,
        paid_on: NaiveDate,
        recorded_by: UserId,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        let bill = tx.lock_bill(bill_id).await?;
        ensure_accepts_payments(&bill)?;
        if amount.currency() != bill.currency() {
            return Err(BillingError::validation(format!(
                "Payment currency {} does not match bill currency {}",
                amount.currency(),
                bill.currency()
            )));
        }

        let key = SequenceKey::for_date(DocumentKind::Receipt, paid_on);
        let sequence = tx.next_sequence(key).await?;
        let payment = Payment::new(
            key.format(sequence),
            bill.id,
            bill.student_id,
            amount,
            method,
            paid_on,
            recorded_by,
        )?;
        tx.insert_payment(&payment).await?;
        recalculate_in(&mut tx, bill_id).await?;
        tx.commit().await?;

        info!(payment_id = %payment.id, receipt = %payment.receipt_number, "payment recorded");
        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        Ok(tx.get_payment(payment_id).await?)
    }

    /// Verifies a pending payment and recalculates its bill
    #[instrument(skip(self), fields(payment_id = %payment_id, verifier = %verifier))]
    pub async fn verify_payment(
        &self,
        payment_id: PaymentId,
        verifier: UserId,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;
        payment
            .verify(verifier)
            .inspect_err(|e| warn!(error = %e, "payment verify rejected"))?;
        tx.update_payment(&payment).await?;
        recalculate_in(&mut tx, payment.bill_id).await?;
        tx.commit().await?;

        info!(bill_id = %payment.bill_id, "payment verified");
        Ok(payment)
    }

    /// Cancels a pending or verified payment and recalculates its bill
    #[instrument(skip(self, reason), fields(payment_id = %payment_id, actor = %actor))]
    pub async fn cancel_payment(
        &self,
        payment_id: PaymentId,
        reason: &str,
        actor: UserId,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;
        if let Some(line) = tx.line_for_payment(payment_id).await? {
            warn!(line_id = %line.id, "payment cancel rejected, still matched");
            return Err(BillingError::validation(format!(
                "Payment is matched to statement line {} and cannot be cancelled; unmatch it first",
                line.id
            )));
        }
        payment
            .cancel(reason, actor)
            .inspect_err(|e| warn!(error = %e, "payment cancel rejected"))?;
        tx.update_payment(&payment).await?;
        recalculate_in(&mut tx, payment.bill_id).await?;
        tx.commit().await?;

        info!(bill_id = %payment.bill_id, "payment cancelled");
        Ok(payment)
    }

    /// Changes a pending payment's amount, method or date
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn amend_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
        paid_on: NaiveDate,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;
        payment.amend(amount, method, paid_on)?;
        tx.update_payment(&payment).await?;
        recalculate_in(&mut tx, payment.bill_id).await?;
        tx.commit().await?;

        info!("payment amended");
        Ok(payment)
    }

    /// Soft-deletes a payment that no statement line references
    #[instrument(skip(self), fields(payment_id = %payment_id, actor = %actor))]
    pub async fn delete_payment(
        &self,
        payment_id: PaymentId,
        actor: UserId,
    ) -> Result<Payment, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;
        if let Some(line) = tx.line_for_payment(payment_id).await? {
            return Err(BillingError::validation(format!(
                "Payment is matched to statement line {} and cannot be deleted",
                line.id
            )));
        }
        payment.soft_delete()?;
        tx.update_payment(&payment).await?;
        recalculate_in(&mut tx, payment.bill_id).await?;
        tx.commit().await?;

        info!("payment deleted");
        Ok(payment)
    }

    // ========================================================================
    // Payment transactions
    // ========================================================================

    /// Creates a pending transaction with no items
    #[instrument(
        skip(self, proof_reference),
        fields(payer_id = %payer_id, recorded_by = %recorded_by)
    )]
    pub async fn create_transaction(
        &self,
        payer_id: GuardianId,
        method: PaymentMethod,
        paid_on: NaiveDate,
        proof_reference: Option<String>,
        recorded_by: UserId,
    ) -> Result<PaymentTransaction, BillingError> {
        let mut tx = self.port.begin().await?;
        let key = SequenceKey::for_date(DocumentKind::Transaction, paid_on);
        let sequence = tx.next_sequence(key).await?;
        let transaction = PaymentTransaction::new(
            key.format(sequence),
            payer_id,
            self.currency,
            method,
            paid_on,
            proof_reference,
            recorded_by,
        );
        tx.insert_transaction(&transaction).await?;
        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            number = %transaction.transaction_number,
            "transaction created"
        );
        Ok(transaction)
    }

    /// Returns a transaction with its items
    pub async fn get_transaction(
        &self,
        transaction_id: PaymentTransactionId,
    ) -> Result<(PaymentTransaction, Vec<PaymentItem>), BillingError> {
        let mut tx = self.port.begin().await?;
        let transaction = tx.get_transaction(transaction_id).await?;
        let items = tx.items_for_transaction(transaction_id).await?;
        Ok((transaction, items))
    }

    /// Allocates part of a transaction to a bill
    ///
    /// If the transaction is already verified the bill is recalculated
    /// immediately.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, bill_id = %bill_id))]
    pub async fn add_transaction_item(
        &self,
        transaction_id: PaymentTransactionId,
        bill_id: BillId,
        amount: Money,
    ) -> Result<PaymentItem, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut transaction = tx.lock_transaction(transaction_id).await?;
        transaction.ensure_editable("add item to")?;

        let bill = tx.lock_bill(bill_id).await?;
        ensure_accepts_payments(&bill)?;
        if amount.currency() != bill.currency() || amount.currency() != transaction.currency() {
            return Err(BillingError::validation(format!(
                "Item currency {} does not match bill or transaction currency",
                amount.currency()
            )));
        }

        let item = PaymentItem::new(transaction_id, bill_id, bill.student_id, amount)?;
        tx.insert_item(&item).await?;
        refresh_transaction_total(&mut tx, &mut transaction).await?;
        recalculate_in(&mut tx, bill_id).await?;
        tx.commit().await?;

        info!(item_id = %item.id, total = %transaction.total_amount, "transaction item added");
        Ok(item)
    }

    /// Changes the amount of an item
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_transaction_item(
        &self,
        item_id: PaymentItemId,
        amount: Money,
    ) -> Result<PaymentItem, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut item = tx.get_item(item_id).await?;
        let mut transaction = tx.lock_transaction(item.transaction_id).await?;
        transaction.ensure_editable("change item of")?;

        item.set_amount(amount)?;
        tx.update_item(&item).await?;
        refresh_transaction_total(&mut tx, &mut transaction).await?;
        recalculate_in(&mut tx, item.bill_id).await?;
        tx.commit().await?;

        info!(total = %transaction.total_amount, "transaction item updated");
        Ok(item)
    }

    /// Removes an item from its transaction
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_transaction_item(
        &self,
        item_id: PaymentItemId,
    ) -> Result<PaymentTransaction, BillingError> {
        let mut tx = self.port.begin().await?;
        let item = tx.get_item(item_id).await?;
        let mut transaction = tx.lock_transaction(item.transaction_id).await?;
        transaction.ensure_editable("remove item from")?;

        tx.delete_item(item_id).await?;
        refresh_transaction_total(&mut tx, &mut transaction).await?;
        recalculate_in(&mut tx, item.bill_id).await?;
        tx.commit().await?;

        info!(total = %transaction.total_amount, "transaction item removed");
        Ok(transaction)
    }

    /// Verifies a transaction and recalculates every bill it pays
    #[instrument(skip(self), fields(transaction_id = %transaction_id, verifier = %verifier))]
    pub async fn verify_transaction(
        &self,
        transaction_id: PaymentTransactionId,
        verifier: UserId,
    ) -> Result<PaymentTransaction, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut transaction = tx.lock_transaction(transaction_id).await?;
        transaction
            .verify(verifier)
            .inspect_err(|e| warn!(error = %e, "transaction verify rejected"))?;
        tx.update_transaction(&transaction).await?;
        let bills = recalculate_transaction_bills(&mut tx, transaction_id).await?;
        tx.commit().await?;

        info!(bills, total = %transaction.total_amount, "transaction verified");
        Ok(transaction)
    }

    /// Cancels a transaction and recalculates every bill it pays
    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id, actor = %actor))]
    pub async fn cancel_transaction(
        &self,
        transaction_id: PaymentTransactionId,
        reason: &str,
        actor: UserId,
    ) -> Result<PaymentTransaction, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut transaction = tx.lock_transaction(transaction_id).await?;
        transaction
            .cancel(reason, actor)
            .inspect_err(|e| warn!(error = %e, "transaction cancel rejected"))?;
        tx.update_transaction(&transaction).await?;
        let bills = recalculate_transaction_bills(&mut tx, transaction_id).await?;
        tx.commit().await?;

        info!(bills, "transaction cancelled");
        Ok(transaction)
    }

    // ========================================================================
    // Bank reconciliation
    // ========================================================================

    /// Imports a statement as a new batch of unmatched lines
    #[instrument(
        skip(self, metadata, lines),
        fields(file = %metadata.file_name, lines = lines.len())
    )]
    pub async fn import_reconciliation_batch(
        &self,
        metadata: StatementMetadata,
        lines: Vec<StatementLineInput>,
        uploaded_by: UserId,
    ) -> Result<ReconciliationBatch, BillingError> {
        let (batch, lines) =
            ReconciliationBatch::import(metadata, self.currency, uploaded_by, lines)?;

        let mut tx = self.port.begin().await?;
        tx.insert_batch(&batch).await?;
        tx.insert_lines(&lines).await?;
        tx.commit().await?;

        info!(batch_id = %batch.id, total_amount = %batch.total_amount, "statement imported");
        Ok(batch)
    }

    pub async fn get_batch(
        &self,
        batch_id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, BillingError> {
        let mut tx = self.port.begin().await?;
        Ok(tx.get_batch(batch_id).await?)
    }

    pub async fn batch_lines(
        &self,
        batch_id: ReconciliationBatchId,
    ) -> Result<Vec<ReconciliationLine>, BillingError> {
        let mut tx = self.port.begin().await?;
        tx.get_batch(batch_id).await?;
        Ok(tx.lines_for_batch(batch_id).await?)
    }

    /// Auto-matches the batch's unmatched credit lines
    ///
    /// Running it again without new payments changes nothing. A verified
    /// batch is returned as is.
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn run_auto_match(
        &self,
        batch_id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, BillingError> {
        let mut attempt = 1;
        loop {
            match self.try_auto_match(batch_id).await {
                Err(BillingError::ConcurrencyConflict(message))
                    if attempt < MAX_CONFLICT_ATTEMPTS =>
                {
                    warn!(attempt, %message, "auto-match lost a payment race, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_auto_match(
        &self,
        batch_id: ReconciliationBatchId,
    ) -> Result<ReconciliationBatch, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut batch = tx.lock_batch(batch_id).await?;
        if batch.is_verified() {
            debug!("batch already verified");
            return Ok(batch);
        }

        let mut lines = tx.lines_for_batch(batch_id).await?;
        let amounts: Vec<Money> = lines
            .iter()
            .filter(|l| l.is_credit() && !l.is_matched())
            .map(|l| l.amount)
            .collect();
        let pool = if amounts.is_empty() {
            Vec::new()
        } else {
            tx.unclaimed_payments(&amounts).await?
        };

        let plan = matcher::plan_pass(&self.policy, &lines, &pool);
        for proposed in &plan {
            if let Some(line) = lines.iter_mut().find(|l| l.id == proposed.line_id) {
                line.match_auto(proposed.payment_id, proposed.confidence)?;
                tx.update_line(line).await?;
                debug!(
                    line_id = %line.id,
                    payment_id = %proposed.payment_id,
                    confidence = %proposed.confidence,
                    "line auto-matched"
                );
            }
        }

        batch.refresh_totals(&lines)?;
        tx.update_batch(&batch).await?;
        tx.commit().await?;

        info!(
            matched = plan.len(),
            unmatched = batch.unmatched_count,
            status = %batch.status,
            "auto-match finished"
        );
        Ok(batch)
    }

    /// Scored candidates for a line, best first, for manual resolution
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn match_candidates(
        &self,
        line_id: ReconciliationLineId,
    ) -> Result<Vec<CandidateScore>, BillingError> {
        let mut tx = self.port.begin().await?;
        let line = tx.get_line(line_id).await?;
        if !line.is_credit() {
            return Ok(Vec::new());
        }
        let pool = tx.unclaimed_payments(&[line.amount]).await?;
        Ok(matcher::rank_candidates(&self.policy, &line, &pool))
    }

    /// Links a line to a payment chosen by a person
    #[instrument(skip(self), fields(line_id = %line_id, payment_id = %payment_id, actor = %actor))]
    pub async fn match_line_manually(
        &self,
        line_id: ReconciliationLineId,
        payment_id: PaymentId,
        actor: UserId,
    ) -> Result<ReconciliationLine, BillingError> {
        let mut attempt = 1;
        loop {
            match self.try_match_manually(line_id, payment_id, actor).await {
                Err(BillingError::ConcurrencyConflict(message))
                    if attempt < MAX_CONFLICT_ATTEMPTS =>
                {
                    warn!(attempt, %message, "manual match lost a payment race, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_match_manually(
        &self,
        line_id: ReconciliationLineId,
        payment_id: PaymentId,
        actor: UserId,
    ) -> Result<ReconciliationLine, BillingError> {
        let mut tx = self.port.begin().await?;
        let batch_id = tx.get_line(line_id).await?.batch_id;
        let mut batch = tx.lock_batch(batch_id).await?;
        // Re-read under the batch lock so a concurrent edit is not overwritten
        let mut line = tx.get_line(line_id).await?;
        batch.ensure_open("match lines in")?;

        let payment = tx.lock_payment(payment_id).await?;
        if !payment.contributes() {
            return Err(BillingError::illegal_transition("payment", payment.status, "match"));
        }
        if let Some(other) = tx.line_for_payment(payment_id).await? {
            if other.id != line.id {
                return Err(BillingError::validation(format!(
                    "Payment {} is already matched to statement line {}",
                    payment.receipt_number, other.id
                )));
            }
        }

        line.match_manual(payment_id, actor)?;
        tx.update_line(&line).await?;
        let lines = tx.lines_for_batch(batch.id).await?;
        batch.refresh_totals(&lines)?;
        tx.update_batch(&batch).await?;
        tx.commit().await?;

        info!(batch_id = %batch.id, status = %batch.status, "line matched manually");
        Ok(line)
    }

    /// Clears a line's match
    #[instrument(skip(self), fields(line_id = %line_id, actor = %actor))]
    pub async fn unmatch_line(
        &self,
        line_id: ReconciliationLineId,
        actor: UserId,
    ) -> Result<ReconciliationLine, BillingError> {
        let mut tx = self.port.begin().await?;
        let batch_id = tx.get_line(line_id).await?.batch_id;
        let mut batch = tx.lock_batch(batch_id).await?;
        // Re-read under the batch lock so a concurrent edit is not overwritten
        let mut line = tx.get_line(line_id).await?;
        batch.ensure_open("unmatch lines in")?;

        let released = line.unmatch();
        tx.update_line(&line).await?;
        let lines = tx.lines_for_batch(batch.id).await?;
        batch.refresh_totals(&lines)?;
        tx.update_batch(&batch).await?;
        tx.commit().await?;

        match released {
            Some(payment_id) => info!(payment_id = %payment_id, "line unmatched"),
            None => debug!("line was not matched"),
        }
        Ok(line)
    }

    /// Signs off a completed batch
    #[instrument(skip(self), fields(batch_id = %batch_id, actor = %actor))]
    pub async fn verify_batch(
        &self,
        batch_id: ReconciliationBatchId,
        actor: UserId,
    ) -> Result<ReconciliationBatch, BillingError> {
        let mut tx = self.port.begin().await?;
        let mut batch = tx.lock_batch(batch_id).await?;
        let lines = tx.lines_for_batch(batch_id).await?;
        let totals = batch.refresh_totals(&lines)?;
        batch.verify(actor).inspect_err(|e| {
            warn!(error = %e, unmatched = totals.unmatched_count, "batch verify rejected")
        })?;
        tx.update_batch(&batch).await?;
        tx.commit().await?;

        info!(matched = batch.matched_count, "batch verified");
        Ok(batch)
    }

    fn ensure_currency(&self, amount: &Money) -> Result<(), BillingError> {
        if amount.currency() != self.currency {
            return Err(BillingError::validation(format!(
                "Amount in {} but the ledger runs in {}",
                amount.currency(),
                self.currency
            )));
        }
        Ok(())
    }
}

fn ensure_accepts_payments(bill: &Bill) -> Result<(), BillingError> {
    if !bill.accepts_payments() {
        let from = if bill.is_deleted() { "deleted".to_string() } else { bill.status.to_string() };
        return Err(BillingError::illegal_transition("bill", from, "pay"));
    }
    Ok(())
}

/// Recalculates one bill inside `tx` and stores it if it changed
async fn recalculate_in<T: LedgerTx>(tx: &mut T, bill_id: BillId) -> Result<Bill, BillingError> {
    let mut bill = tx.lock_bill(bill_id).await?;
    let payments = tx.payments_for_bill(bill_id).await?;
    let items = tx.items_for_bill(bill_id).await?;

    let (result, changed) = recalculation::recalculate(&mut bill, &payments, &items)?;
    if changed {
        tx.update_bill(&bill).await?;
    }
    debug!(
        bill_id = %bill_id,
        legacy = %result.legacy_total.amount(),
        items = %result.item_total.amount(),
        amount_paid = %bill.amount_paid.amount(),
        status = %bill.status,
        changed,
        "bill recalculated"
    );
    Ok(bill)
}

/// Recalculates every bill the transaction's items touch, in id order
async fn recalculate_transaction_bills<T: LedgerTx>(
    tx: &mut T,
    transaction_id: PaymentTransactionId,
) -> Result<usize, BillingError> {
    let bill_ids: BTreeSet<BillId> = tx
        .items_for_transaction(transaction_id)
        .await?
        .into_iter()
        .map(|item| item.bill_id)
        .collect();
    for bill_id in &bill_ids {
        recalculate_in(tx, *bill_id).await?;
    }
    Ok(bill_ids.len())
}

async fn refresh_transaction_total<T: LedgerTx>(
    tx: &mut T,
    transaction: &mut PaymentTransaction,
) -> Result<(), BillingError> {
    let items = tx.items_for_transaction(transaction.id).await?;
    if transaction.recompute_total(&items)? {
        tx.update_transaction(transaction).await?;
    }
    Ok(())
}
