//! Payment endpoints. `customer_id` and `invoice_id` are both
//! optional; a payment against an invoice inherits its customer when
//! none is given.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{Page, DEFAULT_PAGE_SIZE};
use crate::models::{
    CreatePayment, ListPaymentsFilter, Payment, PaymentMethod, PaymentStatus, UpdatePayment,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub status: Option<String>,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    pub invoice_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

fn parse_method(s: &str) -> Result<PaymentMethod, AppError> {
    PaymentMethod::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown payment method '{}'", s)))
}

fn parse_status(s: &str) -> Result<PaymentStatus, AppError> {
    PaymentStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown payment status '{}'", s)))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    request.validate()?;

    let method = parse_method(&request.method)?;
    let status = match request.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => PaymentStatus::Pending,
    };

    let payment = state
        .db
        .create_payment(&CreatePayment {
            customer_id: request.customer_id,
            invoice_id: request.invoice_id,
            amount: request.amount,
            method,
            status,
            payment_date: request.payment_date,
            reference: request.reference,
            notes: request.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[tracing::instrument(skip(state))]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(payment))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Page<Payment>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let payments = state
        .db
        .list_payments(&ListPaymentsFilter {
            status,
            customer_id: query.customer_id,
            invoice_id: query.invoice_id,
            start_date: query.start_date,
            end_date: query.end_date,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(payments, page_size, |p| p.payment_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    request.validate()?;

    let method = request.method.as_deref().map(parse_method).transpose()?;
    let status = request.status.as_deref().map(parse_status).transpose()?;

    let payment = state
        .db
        .update_payment(
            payment_id,
            &UpdatePayment {
                invoice_id: request.invoice_id,
                amount: request.amount,
                method,
                status,
                payment_date: request.payment_date,
                reference: request.reference,
                notes: request.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(payment))
}

#[tracing::instrument(skip(state))]
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_payment(payment_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
