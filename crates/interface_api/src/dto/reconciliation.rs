//! Reconciliation DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{
    BatchStatus, CandidateScore, Direction, MatchType, ReconciliationBatch, ReconciliationLine,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ImportBatchRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    pub file_reference: Option<String>,
    pub bank_account: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[validate(length(min = 1))]
    pub lines: Vec<StatementLineRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatementLineRequest {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualMatchRequest {
    pub payment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub id: Uuid,
    pub file_name: String,
    pub file_reference: Option<String>,
    pub bank_account: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    pub total_transactions: u32,
    pub total_amount: Decimal,
    pub matched_count: u32,
    pub matched_amount: Decimal,
    pub unmatched_count: u32,
    pub match_rate: Decimal,
    pub status: BatchStatus,
    pub uploaded_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<LineResponse>>,
}

impl BatchResponse {
    pub fn with_lines(batch: ReconciliationBatch, lines: Vec<ReconciliationLine>) -> Self {
        let mut response = Self::from(batch);
        response.lines = Some(lines.into_iter().map(LineResponse::from).collect());
        response
    }
}

impl From<ReconciliationBatch> for BatchResponse {
    fn from(batch: ReconciliationBatch) -> Self {
        Self {
            id: batch.id.into(),
            match_rate: batch.match_rate().round_dp(2),
            file_name: batch.metadata.file_name,
            file_reference: batch.metadata.file_reference,
            bank_account: batch.metadata.bank_account,
            period_start: batch.metadata.period_start,
            period_end: batch.metadata.period_end,
            currency: batch.currency.code().to_string(),
            total_transactions: batch.total_transactions,
            total_amount: batch.total_amount.amount(),
            matched_count: batch.matched_count,
            matched_amount: batch.matched_amount.amount(),
            unmatched_count: batch.unmatched_count,
            status: batch.status,
            uploaded_by: batch.uploaded_by.into(),
            verified_by: batch.verified_by.map(Into::into),
            verified_at: batch.verified_at,
            created_at: batch.created_at,
            lines: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub line_number: u32,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub reference: Option<String>,
    pub match_type: MatchType,
    pub matched_payment_id: Option<Uuid>,
    pub confidence: Option<Decimal>,
    pub matched_by: Option<Uuid>,
    pub matched_at: Option<DateTime<Utc>>,
}

impl From<ReconciliationLine> for LineResponse {
    fn from(line: ReconciliationLine) -> Self {
        Self {
            id: line.id.into(),
            batch_id: line.batch_id.into(),
            line_number: line.line_number,
            transaction_date: line.transaction_date,
            amount: line.amount.amount(),
            direction: line.direction,
            match_type: line.match_type(),
            matched_payment_id: line.matched_payment_id().map(Into::into),
            confidence: line.match_state.confidence(),
            matched_by: line.match_state.matched_by().map(Into::into),
            matched_at: line.match_state.matched_at(),
            description: line.description,
            reference: line.reference,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CandidateResponse {
    pub payment_id: Uuid,
    pub confidence: Decimal,
    pub date_score: Decimal,
    pub reference_score: Decimal,
    pub date_offset_days: i64,
}

impl From<CandidateScore> for CandidateResponse {
    fn from(score: CandidateScore) -> Self {
        Self {
            payment_id: score.payment_id.into(),
            confidence: score.confidence,
            date_score: score.date_score,
            reference_score: score.reference_score,
            date_offset_days: score.date_offset_days,
        }
    }
}
