//! Bill handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{AcademicYearId, BillId, FeeCategoryId, StudentId};
use domain_billing::{BillingPeriod, LedgerPort};

use crate::auth::{permissions, Actor};
use crate::dto::bills::*;
use crate::dto::CancelRequest;
use crate::{error::ApiError, AppState};

/// Creates a bill
pub async fn create_bill<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), ApiError> {
    actor.require(permissions::BILL_WRITE)?;
    request.validate()?;

    let academic_year = AcademicYearId::from_uuid(request.academic_year_id);
    let period = match request.month {
        Some(month) => BillingPeriod::monthly(academic_year, month)?,
        None => BillingPeriod::yearly(academic_year),
    };

    let bill = state
        .ledger
        .create_bill(
            StudentId::from_uuid(request.student_id),
            FeeCategoryId::from_uuid(request.category_id),
            period,
            state.money(request.amount_due),
            request.due_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(bill.into())))
}

/// Gets a bill by ID
pub async fn get_bill<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BillResponse>, ApiError> {
    actor.require(permissions::BILL_READ)?;
    let bill = state.ledger.get_bill(BillId::from_uuid(id)).await?;
    Ok(Json(bill.into()))
}

/// Cancels a bill
pub async fn cancel_bill<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<BillResponse>, ApiError> {
    actor.require(permissions::BILL_WRITE)?;
    request.validate()?;
    let bill = state
        .ledger
        .cancel_bill(BillId::from_uuid(id), &request.reason, actor.user_id)
        .await?;
    Ok(Json(bill.into()))
}

/// Soft-deletes a bill
pub async fn delete_bill<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BillResponse>, ApiError> {
    actor.require(permissions::BILL_WRITE)?;
    let bill = state.ledger.delete_bill(BillId::from_uuid(id), actor.user_id).await?;
    Ok(Json(bill.into()))
}

/// Re-derives a bill's paid amount and status
pub async fn recalculate_bill<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BillResponse>, ApiError> {
    actor.require(permissions::BILL_WRITE)?;
    let bill = state.ledger.recalculate_bill(BillId::from_uuid(id)).await?;
    Ok(Json(bill.into()))
}

/// Lists outstanding bills due on or before a date (today by default)
pub async fn due_bills<P: LedgerPort>(
    State(state): State<AppState<P>>,
    actor: Actor,
    Query(query): Query<DueBillsQuery>,
) -> Result<Json<Vec<BillResponse>>, ApiError> {
    actor.require(permissions::BILL_READ)?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let bills = state.ledger.bills_due_for_reminder(as_of).await?;
    Ok(Json(bills.into_iter().map(BillResponse::from).collect()))
}
