//! Bank reconciliation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{PaymentId, ReconciliationBatchId, ReconciliationLineId};
use domain_billing::{LedgerPort, StatementLineInput, StatementMetadata};

use crate::auth::{permissions, Actor};
use crate::dto::reconciliation::*;
use crate::{error::ApiError, AppState};

/// Imports a parsed bank statement as a new batch
pub async fn import_batch<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Json(request): Json<ImportBatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    request.validate()?;

    let metadata = StatementMetadata {
        file_name: request.file_name,
        file_reference: request.file_reference,
        bank_account: request.bank_account,
        period_start: request.period_start,
        period_end: request.period_end,
    };
    let lines = request
        .lines
        .into_iter()
        .map(|line| StatementLineInput {
            transaction_date: line.transaction_date,
            description: line.description,
            amount: state.money(line.amount),
            direction: line.direction,
            reference: line.reference,
        })
        .collect();

    let batch = state
        .ledger
        .import_reconciliation_batch(metadata, lines, actor.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(batch.into())))
}

/// Gets a batch with all of its lines
pub async fn get_batch<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    let batch_id = ReconciliationBatchId::from_uuid(id);
    let batch = state.ledger.get_batch(batch_id).await?;
    let lines = state.ledger.batch_lines(batch_id).await?;
    Ok(Json(BatchResponse::with_lines(batch, lines)))
}

pub async fn run_auto_match<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    let batch = state
        .ledger
        .run_auto_match(ReconciliationBatchId::from_uuid(id))
        .await?;
    Ok(Json(batch.into()))
}

pub async fn verify_batch<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    actor.require(permissions::RECONCILIATION_VERIFY)?;
    let batch = state
        .ledger
        .verify_batch(ReconciliationBatchId::from_uuid(id), actor.user_id)
        .await?;
    Ok(Json(batch.into()))
}

/// Scored candidate payments for one line, best first
pub async fn line_candidates<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CandidateResponse>>, ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    let candidates = state
        .ledger
        .match_candidates(ReconciliationLineId::from_uuid(id))
        .await?;
    Ok(Json(candidates.into_iter().map(CandidateResponse::from).collect()))
}

pub async fn match_line<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ManualMatchRequest>,
) -> Result<Json<LineResponse>, ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    let line = state
        .ledger
        .match_line_manually(
            ReconciliationLineId::from_uuid(id),
            PaymentId::from_uuid(request.payment_id),
            actor.user_id,
        )
        .await?;
    Ok(Json(line.into()))
}

pub async fn unmatch_line<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<LineResponse>, ApiError> {
    actor.require(permissions::RECONCILIATION_WRITE)?;
    let line = state
        .ledger
        .unmatch_line(ReconciliationLineId::from_uuid(id), actor.user_id)
        .await?;
    Ok(Json(line.into()))
}
