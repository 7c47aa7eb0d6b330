//! Legacy payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, PaymentId};
use domain_billing::LedgerPort;

use crate::auth::{permissions, Actor};
use crate::dto::payments::*;
use crate::dto::CancelRequest;
use crate::{error::ApiError, AppState};

/// Records a pending receipt payment against one bill
pub async fn record_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let payment = state
        .ledger
        .record_legacy_payment(
            BillId::from_uuid(request.bill_id),
            state.money(request.amount),
            request.method,
            request.paid_on,
            actor.user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

pub async fn get_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    actor.require(permissions::BILL_READ)?;
    let payment = state.ledger.get_payment(PaymentId::from_uuid(id)).await?;
    Ok(Json(payment.into()))
}

pub async fn verify_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    actor.require(permissions::PAYMENT_VERIFY)?;
    let payment = state
        .ledger
        .verify_payment(PaymentId::from_uuid(id), actor.user_id)
        .await?;
    Ok(Json(payment.into()))
}

pub async fn cancel_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    actor.require(permissions::PAYMENT_VERIFY)?;
    request.validate()?;
    let payment = state
        .ledger
        .cancel_payment(PaymentId::from_uuid(id), &request.reason, actor.user_id)
        .await?;
    Ok(Json(payment.into()))
}

/// Corrects a payment that is still pending
pub async fn amend_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<AmendPaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let payment = state
        .ledger
        .amend_payment(
            PaymentId::from_uuid(id),
            state.money(request.amount),
            request.method,
            request.paid_on,
        )
        .await?;
    Ok(Json(payment.into()))
}

pub async fn delete_payment<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    actor.require(permissions::PAYMENT_WRITE)?;
    let payment = state
        .ledger
        .delete_payment(PaymentId::from_uuid(id), actor.user_id)
        .await?;
    Ok(Json(payment.into()))
}
