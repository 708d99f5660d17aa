//! Invoice endpoints. Single-document responses carry the header with
//! its ordered line items so a fetch returns exactly what a create
//! computed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{to_new_line_items, LineItemRequest, Page, DEFAULT_PAGE_SIZE};
use crate::models::{
    CreateInvoice, Invoice, InvoiceItem, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub status: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Invoice header plus its line items in document order.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

fn parse_status(s: &str) -> Result<InvoiceStatus, AppError> {
    InvoiceStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown invoice status '{}'", s)))
}

fn check_tax_rate(tax_rate: Decimal) -> Result<(), AppError> {
    if tax_rate < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate cannot be negative"
        )));
    }
    Ok(())
}

#[tracing::instrument(skip(state, request))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    request.validate()?;
    check_tax_rate(request.tax_rate)?;

    let status = match request.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => InvoiceStatus::Draft,
    };

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            customer_id: request.customer_id,
            status,
            issue_date: request.issue_date,
            due_date: request.due_date,
            tax_rate: request.tax_rate,
            notes: request.notes,
            items: to_new_line_items(&request.items),
        })
        .await?;

    let items = state.db.get_invoice_items(invoice.invoice_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse { invoice, items }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let items = state.db.get_invoice_items(invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice, items }))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Page<Invoice>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let invoices = state
        .db
        .list_invoices(&ListInvoicesFilter {
            status,
            customer_id: query.customer_id,
            start_date: query.start_date,
            end_date: query.end_date,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(invoices, page_size, |i| i.invoice_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    request.validate()?;
    if let Some(tax_rate) = request.tax_rate {
        check_tax_rate(tax_rate)?;
    }
    if matches!(request.items.as_deref(), Some([])) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one line item is required"
        )));
    }

    let status = request.status.as_deref().map(parse_status).transpose()?;

    let invoice = state
        .db
        .update_invoice(
            invoice_id,
            &UpdateInvoice {
                customer_id: request.customer_id,
                status,
                issue_date: request.issue_date,
                due_date: request.due_date,
                tax_rate: request.tax_rate,
                notes: request.notes,
                items: request.items.as_deref().map(to_new_line_items),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let items = state.db.get_invoice_items(invoice_id).await?;

    Ok(Json(InvoiceResponse { invoice, items }))
}

#[tracing::instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_invoice(invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
