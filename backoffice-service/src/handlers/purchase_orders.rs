//! Purchase order endpoints. Line item payloads may say `unit_cost`
//! instead of `unit_price`; responses always say `unit_cost`. Setting
//! the status to `received` books the goods into stock.

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
    CreatePurchaseOrder, ListPurchaseOrdersFilter, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus, UpdatePurchaseOrder,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    #[validate(length(min = 1, message = "Supplier name cannot be empty"))]
    pub supplier_name: String,
    pub status: Option<String>,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePurchaseOrderRequest {
    #[validate(length(min = 1, message = "Supplier name cannot be empty"))]
    pub supplier_name: Option<String>,
    pub status: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ListPurchaseOrdersQuery {
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Order header plus its line items in document order.
#[derive(Debug, Serialize)]
pub struct PurchaseOrderResponse {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

fn parse_status(s: &str) -> Result<PurchaseOrderStatus, AppError> {
    PurchaseOrderStatus::parse(s).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown purchase order status '{}'", s))
    })
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
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(request): Json<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<PurchaseOrderResponse>), AppError> {
    request.validate()?;
    check_tax_rate(request.tax_rate)?;

    let status = match request.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => PurchaseOrderStatus::Draft,
    };

    let order = state
        .db
        .create_purchase_order(&CreatePurchaseOrder {
            supplier_name: request.supplier_name,
            status,
            order_date: request.order_date,
            expected_date: request.expected_date,
            tax_rate: request.tax_rate,
            notes: request.notes,
            items: to_new_line_items(&request.items),
        })
        .await?;

    let items = state.db.get_purchase_order_items(order.po_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseOrderResponse { order, items }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<Json<PurchaseOrderResponse>, AppError> {
    let order = state
        .db
        .get_purchase_order(po_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Purchase order not found")))?;
    let items = state.db.get_purchase_order_items(po_id).await?;

    Ok(Json(PurchaseOrderResponse { order, items }))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<ListPurchaseOrdersQuery>,
) -> Result<Json<Page<PurchaseOrder>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let orders = state
        .db
        .list_purchase_orders(&ListPurchaseOrdersFilter {
            status,
            start_date: query.start_date,
            end_date: query.end_date,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(orders, page_size, |o| o.po_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
    Json(request): Json<UpdatePurchaseOrderRequest>,
) -> Result<Json<PurchaseOrderResponse>, AppError> {
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

    let order = state
        .db
        .update_purchase_order(
            po_id,
            &UpdatePurchaseOrder {
                supplier_name: request.supplier_name,
                status,
                order_date: request.order_date,
                expected_date: request.expected_date,
                tax_rate: request.tax_rate,
                notes: request.notes,
                items: request.items.as_deref().map(to_new_line_items),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Purchase order not found")))?;

    let items = state.db.get_purchase_order_items(po_id).await?;

    Ok(Json(PurchaseOrderResponse { order, items }))
}

#[tracing::instrument(skip(state))]
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_purchase_order(po_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Purchase order not found"
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
