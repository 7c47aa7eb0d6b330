//! Bank reconciliation batches and lines
//!
//! A batch is one imported bank statement. Each statement row becomes a
//! [`ReconciliationLine`] that is either unmatched or linked to exactly one
//! legacy payment, automatically (with a confidence score) or by a person.
//!
//! Batch counters are never edited directly; [`ReconciliationBatch::refresh_totals`]
//! re-derives them from the lines after every line mutation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, PaymentId, ReconciliationBatchId, ReconciliationLineId, UserId};
use crate::error::BillingError;

/// Direction of a statement row as seen from the school's account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money in
    Credit,
    /// Money out
    Debit,
}

/// Batch status, ordered from least to most advanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Imported, nothing matched yet
    Draft,
    /// At least one line matched
    Processing,
    /// Every credit line matched
    Completed,
    /// Signed off; lines are frozen
    Verified,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Verified => "verified",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a line got its match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Auto,
    Manual,
    Unmatched,
}

/// Match state of a statement line
///
/// The variants carry exactly the data each state requires, so an auto
/// match always has a confidence and a manual match always has a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match_type", rename_all = "snake_case")]
pub enum LineMatch {
    Unmatched,
    Auto {
        payment_id: PaymentId,
        /// Score in `[0, 1]`
        confidence: Decimal,
        matched_at: DateTime<Utc>,
    },
    Manual {
        payment_id: PaymentId,
        matched_by: UserId,
        matched_at: DateTime<Utc>,
    },
}

impl LineMatch {
    pub fn match_type(&self) -> MatchType {
        match self {
            LineMatch::Unmatched => MatchType::Unmatched,
            LineMatch::Auto { .. } => MatchType::Auto,
            LineMatch::Manual { .. } => MatchType::Manual,
        }
    }

    pub fn payment_id(&self) -> Option<PaymentId> {
        match self {
            LineMatch::Unmatched => None,
            LineMatch::Auto { payment_id, .. } | LineMatch::Manual { payment_id, .. } => {
                Some(*payment_id)
            }
        }
    }

    pub fn confidence(&self) -> Option<Decimal> {
        match self {
            LineMatch::Auto { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    pub fn matched_by(&self) -> Option<UserId> {
        match self {
            LineMatch::Manual { matched_by, .. } => Some(*matched_by),
            _ => None,
        }
    }

    pub fn matched_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LineMatch::Unmatched => None,
            LineMatch::Auto { matched_at, .. } | LineMatch::Manual { matched_at, .. } => {
                Some(*matched_at)
            }
        }
    }
}

/// Statement file details supplied at import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementMetadata {
    /// Original file name
    pub file_name: String,
    /// Opaque reference into the file store
    pub file_reference: Option<String>,
    /// Bank account the statement belongs to
    pub bank_account: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// One statement row as parsed from the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLineInput {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    /// Bank reference, often carrying the payer's transfer note
    pub reference: Option<String>,
}

/// One statement row in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationLine {
    /// Unique identifier
    pub id: ReconciliationLineId,
    /// Owning batch
    pub batch_id: ReconciliationBatchId,
    /// 1-based position in the statement
    pub line_number: u32,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    pub reference: Option<String>,
    /// Current match
    pub match_state: LineMatch,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ReconciliationLine {
    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }

    pub fn is_matched(&self) -> bool {
        self.match_state.payment_id().is_some()
    }

    pub fn match_type(&self) -> MatchType {
        self.match_state.match_type()
    }

    pub fn matched_payment_id(&self) -> Option<PaymentId> {
        self.match_state.payment_id()
    }

    /// Records an algorithmic match
    pub fn match_auto(
        &mut self,
        payment_id: PaymentId,
        confidence: Decimal,
    ) -> Result<(), BillingError> {
        self.ensure_matchable()?;
        if confidence < Decimal::ZERO || confidence > Decimal::ONE {
            return Err(BillingError::validation(format!(
                "Confidence out of range: {}",
                confidence
            )));
        }

        let now = Utc::now();
        self.match_state = LineMatch::Auto {
            payment_id,
            confidence,
            matched_at: now,
        };
        self.updated_at = now;
        Ok(())
    }

    /// Records a match chosen by a person, replacing any previous match
    pub fn match_manual(
        &mut self,
        payment_id: PaymentId,
        actor: UserId,
    ) -> Result<(), BillingError> {
        self.ensure_matchable()?;

        let now = Utc::now();
        self.match_state = LineMatch::Manual {
            payment_id,
            matched_by: actor,
            matched_at: now,
        };
        self.updated_at = now;
        Ok(())
    }

    /// Clears the match, returning the payment that was released
    pub fn unmatch(&mut self) -> Option<PaymentId> {
        let released = self.match_state.payment_id();
        if released.is_some() {
            self.match_state = LineMatch::Unmatched;
            self.updated_at = Utc::now();
        }
        released
    }

    fn ensure_matchable(&self) -> Result<(), BillingError> {
        if !self.is_credit() {
            return Err(BillingError::validation("Only credit lines can be matched to payments"));
        }
        Ok(())
    }
}

/// Counters derived from a batch's lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    /// Every imported line, credit and debit
    pub total_transactions: u32,
    /// Sum of credit lines
    pub total_amount: Money,
    pub matched_count: u32,
    pub matched_amount: Money,
    /// Credit lines without a match
    pub unmatched_count: u32,
}

impl BatchTotals {
    /// Derives the counters from the lines
    pub fn from_lines(
        currency: Currency,
        lines: &[ReconciliationLine],
    ) -> Result<Self, BillingError> {
        let credits: Vec<&ReconciliationLine> = lines.iter().filter(|l| l.is_credit()).collect();
        let matched: Vec<&ReconciliationLine> =
            credits.iter().copied().filter(|l| l.is_matched()).collect();

        Ok(Self {
            total_transactions: lines.len() as u32,
            total_amount: Money::sum(credits.iter().map(|l| &l.amount), currency)?,
            matched_count: matched.len() as u32,
            matched_amount: Money::sum(matched.iter().map(|l| &l.amount), currency)?,
            unmatched_count: (credits.len() - matched.len()) as u32,
        })
    }

    /// Status these counters point to, before monotonicity is applied
    pub fn derived_status(&self) -> BatchStatus {
        if self.unmatched_count == 0 {
            BatchStatus::Completed
        } else if self.matched_count > 0 {
            BatchStatus::Processing
        } else {
            BatchStatus::Draft
        }
    }
}

/// One imported bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationBatch {
    /// Unique identifier
    pub id: ReconciliationBatchId,
    pub metadata: StatementMetadata,
    pub currency: Currency,
    pub total_transactions: u32,
    pub total_amount: Money,
    pub matched_count: u32,
    pub matched_amount: Money,
    pub unmatched_count: u32,
    pub status: BatchStatus,
    pub uploaded_by: UserId,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ReconciliationBatch {
    /// Builds a batch and its unmatched lines from a parsed statement
    pub fn import(
        metadata: StatementMetadata,
        currency: Currency,
        uploaded_by: UserId,
        inputs: Vec<StatementLineInput>,
    ) -> Result<(Self, Vec<ReconciliationLine>), BillingError> {
        if metadata.file_name.trim().is_empty() {
            return Err(BillingError::validation("Statement file name is required"));
        }
        if metadata.period_start > metadata.period_end {
            return Err(BillingError::validation("Statement period starts after it ends"));
        }
        if inputs.is_empty() {
            return Err(BillingError::validation("Statement has no lines"));
        }

        let now = Utc::now();
        let id = ReconciliationBatchId::new_v7();

        let mut lines = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            if input.amount.currency() != currency {
                return Err(BillingError::validation(format!(
                    "Line {} is in {}, statement is in {}",
                    index + 1,
                    input.amount.currency(),
                    currency
                )));
            }
            if !input.amount.is_positive() {
                return Err(BillingError::validation(format!(
                    "Line {} amount must be positive",
                    index + 1
                )));
            }

            lines.push(ReconciliationLine {
                id: ReconciliationLineId::new_v7(),
                batch_id: id,
                line_number: index as u32 + 1,
                transaction_date: input.transaction_date,
                description: input.description,
                amount: input.amount,
                direction: input.direction,
                reference: input.reference,
                match_state: LineMatch::Unmatched,
                created_at: now,
                updated_at: now,
            });
        }

        let mut batch = Self {
            id,
            metadata,
            currency,
            total_transactions: 0,
            total_amount: Money::zero(currency),
            matched_count: 0,
            matched_amount: Money::zero(currency),
            unmatched_count: 0,
            status: BatchStatus::Draft,
            uploaded_by,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        batch.refresh_totals(&lines)?;

        Ok((batch, lines))
    }

    pub fn is_verified(&self) -> bool {
        self.status == BatchStatus::Verified
    }

    /// Fails once the batch is verified
    pub fn ensure_open(&self, action: &'static str) -> Result<(), BillingError> {
        if self.is_verified() {
            return Err(BillingError::illegal_transition(
                "reconciliation batch",
                self.status,
                action,
            ));
        }
        Ok(())
    }

    /// Re-derives the counters and escalates the status
    ///
    /// The status only moves forward: `max(current, derived)`.
    pub fn refresh_totals(
        &mut self,
        lines: &[ReconciliationLine],
    ) -> Result<BatchTotals, BillingError> {
        let totals = BatchTotals::from_lines(self.currency, lines)?;

        self.total_transactions = totals.total_transactions;
        self.total_amount = totals.total_amount;
        self.matched_count = totals.matched_count;
        self.matched_amount = totals.matched_amount;
        self.unmatched_count = totals.unmatched_count;
        self.status = self.status.max(totals.derived_status());
        self.updated_at = Utc::now();

        Ok(totals)
    }

    /// Signs the batch off
    pub fn verify(&mut self, actor: UserId) -> Result<(), BillingError> {
        if self.status != BatchStatus::Completed || self.unmatched_count > 0 {
            return Err(BillingError::illegal_transition(
                "reconciliation batch",
                self.status,
                "verify",
            ));
        }

        let now = Utc::now();
        self.status = BatchStatus::Verified;
        self.verified_by = Some(actor);
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Matched credit lines as a percentage of all credit lines
    pub fn match_rate(&self) -> Decimal {
        let credit_lines = self.matched_count + self.unmatched_count;
        if credit_lines > 0 {
            Decimal::from(self.matched_count) / Decimal::from(credit_lines) * Decimal::from(100)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn metadata() -> StatementMetadata {
        StatementMetadata {
            file_name: "mutasi-januari.csv".to_string(),
            file_reference: None,
            bank_account: Some("BCA 123-456".to_string()),
            period_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        }
    }

    fn input(amount: Decimal, direction: Direction) -> StatementLineInput {
        StatementLineInput {
            transaction_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            description: "TRSF E-BANKING".to_string(),
            amount: Money::new(amount, Currency::IDR),
            direction,
            reference: None,
        }
    }

    fn imported() -> (ReconciliationBatch, Vec<ReconciliationLine>) {
        ReconciliationBatch::import(
            metadata(),
            Currency::IDR,
            UserId::new(),
            vec![
                input(dec!(300000), Direction::Credit),
                input(dec!(150000), Direction::Credit),
                input(dec!(25000), Direction::Debit),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_import_counts_lines() {
        let (batch, lines) = imported();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.match_type() == MatchType::Unmatched));
        assert_eq!(batch.total_transactions, 3);
        assert_eq!(batch.total_amount.amount(), dec!(450000));
        assert_eq!(batch.unmatched_count, 2);
        assert_eq!(batch.status, BatchStatus::Draft);
    }

    #[test]
    fn test_status_escalates_and_never_regresses() {
        let (mut batch, mut lines) = imported();

        lines[0].match_auto(PaymentId::new(), dec!(0.95)).unwrap();
        batch.refresh_totals(&lines).unwrap();
        assert_eq!(batch.status, BatchStatus::Processing);

        lines[1].match_manual(PaymentId::new(), UserId::new()).unwrap();
        batch.refresh_totals(&lines).unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.matched_amount.amount(), dec!(450000));

        lines[1].unmatch();
        batch.refresh_totals(&lines).unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.unmatched_count, 1);
        assert!(batch.verify(UserId::new()).is_err());
    }

    #[test]
    fn test_verify_requires_completed() {
        let (mut batch, mut lines) = imported();
        assert!(batch.verify(UserId::new()).is_err());

        lines[0].match_auto(PaymentId::new(), dec!(1)).unwrap();
        lines[1].match_auto(PaymentId::new(), dec!(1)).unwrap();
        batch.refresh_totals(&lines).unwrap();
        batch.verify(UserId::new()).unwrap();
        assert!(batch.is_verified());
        assert!(batch.ensure_open("match").is_err());
    }

    #[test]
    fn test_debit_lines_cannot_be_matched() {
        let (_, mut lines) = imported();
        assert!(lines[2].match_manual(PaymentId::new(), UserId::new()).is_err());
    }

    #[test]
    fn test_line_match_invariants() {
        let (_, mut lines) = imported();
        let actor = UserId::new();
        lines[0].match_manual(PaymentId::new(), actor).unwrap();
        assert_eq!(lines[0].match_state.matched_by(), Some(actor));
        assert_eq!(lines[0].match_state.confidence(), None);

        let released = lines[0].unmatch();
        assert!(released.is_some());
        assert_eq!(lines[0].match_state, LineMatch::Unmatched);
        assert_eq!(lines[0].unmatch(), None);
    }

    #[test]
    fn test_match_rate() {
        let (mut batch, mut lines) = imported();
        lines[0].match_auto(PaymentId::new(), dec!(0.9)).unwrap();
        batch.refresh_totals(&lines).unwrap();
        assert_eq!(batch.match_rate(), dec!(50));
    }

    #[test]
    fn test_import_rejects_foreign_currency_line() {
        let mut bad = input(dec!(10), Direction::Credit);
        bad.amount = Money::new(dec!(10), Currency::USD);
        let result =
            ReconciliationBatch::import(metadata(), Currency::IDR, UserId::new(), vec![bad]);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }
}
