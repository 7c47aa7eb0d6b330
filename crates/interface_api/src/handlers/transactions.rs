//! Payment transaction handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, GuardianId, PaymentItemId, PaymentTransactionId};
use domain_billing::LedgerPort;

use crate::auth::{permissions, Actor};
use crate::dto::transactions::*;
use crate::dto::CancelRequest;
use crate::{error::ApiError, AppState};

/// Opens an empty pending transaction for a payer
pub async fn create_transaction<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    request.validate()?;
    let transaction = state
        .ledger
        .create_transaction(
            GuardianId::from_uuid(request.payer_id),
            request.method,
            request.paid_on,
            request.proof_reference,
            actor.user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// Gets a transaction with its items
pub async fn get_transaction<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, ApiError> {
    actor.require(permissions::BILL_READ)?;
    let (transaction, items) = state
        .ledger
        .get_transaction(PaymentTransactionId::from_uuid(id))
        .await?;
    Ok(Json(TransactionResponse::with_items(transaction, items)))
}

pub async fn add_item<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let item = state
        .ledger
        .add_transaction_item(
            PaymentTransactionId::from_uuid(id),
            BillId::from_uuid(request.bill_id),
            state.money(request.amount),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn update_item<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let item = state
        .ledger
        .update_transaction_item(PaymentItemId::from_uuid(id), state.money(request.amount))
        .await?;
    Ok(Json(item.into()))
}

/// Removes an item and returns the transaction with its new total
pub async fn remove_item<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let transaction = state
        .ledger
        .remove_transaction_item(PaymentItemId::from_uuid(id))
        .await?;
    Ok(Json(transaction.into()))
}

pub async fn verify_transaction<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, ApiError> {
    actor.require(permissions::PAYMENT_VERIFY)?;
    let transaction = state
        .ledger
        .verify_transaction(PaymentTransactionId::from_uuid(id), actor.user_id)
        .await?;
    Ok(Json(transaction.into()))
}

pub async fn cancel_transaction<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    actor.require(permissions::PAYMENT_VERIFY)?;
    request.validate()?;
    let transaction = state
        .ledger
        .cancel_transaction(PaymentTransactionId::from_uuid(id), &request.reason, actor.user_id)
        .await?;
    Ok(Json(transaction.into()))
}
