//! Sales order endpoints. Setting the status to `shipped` is the
//! signal that goods left the building; the stock side effect happens
//! in the database layer, inside the update's transaction.

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
    CreateSalesOrder, ListSalesOrdersFilter, SalesOrder, SalesOrderItem, SalesOrderStatus,
    UpdateSalesOrder,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalesOrderRequest {
    pub customer_id: Uuid,
    pub status: Option<String>,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSalesOrderRequest {
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ListSalesOrdersQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Order header plus its line items in document order.
#[derive(Debug, Serialize)]
pub struct SalesOrderResponse {
    #[serde(flatten)]
    pub order: SalesOrder,
    pub items: Vec<SalesOrderItem>,
}

fn parse_status(s: &str) -> Result<SalesOrderStatus, AppError> {
    SalesOrderStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown order status '{}'", s)))
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
pub async fn create_sales_order(
    State(state): State<AppState>,
    Json(request): Json<CreateSalesOrderRequest>,
) -> Result<(StatusCode, Json<SalesOrderResponse>), AppError> {
    request.validate()?;
    check_tax_rate(request.tax_rate)?;

    let status = match request.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => SalesOrderStatus::Draft,
    };

    let order = state
        .db
        .create_sales_order(&CreateSalesOrder {
            customer_id: request.customer_id,
            status,
            order_date: request.order_date,
            delivery_date: request.delivery_date,
            tax_rate: request.tax_rate,
            notes: request.notes,
            items: to_new_line_items(&request.items),
        })
        .await?;

    let items = state.db.get_sales_order_items(order.order_id).await?;

    Ok((StatusCode::CREATED, Json(SalesOrderResponse { order, items })))
}

#[tracing::instrument(skip(state))]
pub async fn get_sales_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<SalesOrderResponse>, AppError> {
    let order = state
        .db
        .get_sales_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sales order not found")))?;
    let items = state.db.get_sales_order_items(order_id).await?;

    Ok(Json(SalesOrderResponse { order, items }))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_sales_orders(
    State(state): State<AppState>,
    Query(query): Query<ListSalesOrdersQuery>,
) -> Result<Json<Page<SalesOrder>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let orders = state
        .db
        .list_sales_orders(&ListSalesOrdersFilter {
            status,
            customer_id: query.customer_id,
            start_date: query.start_date,
            end_date: query.end_date,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(orders, page_size, |o| o.order_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_sales_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateSalesOrderRequest>,
) -> Result<Json<SalesOrderResponse>, AppError> {
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
        .update_sales_order(
            order_id,
            &UpdateSalesOrder {
                customer_id: request.customer_id,
                status,
                order_date: request.order_date,
                delivery_date: request.delivery_date,
                tax_rate: request.tax_rate,
                notes: request.notes,
                items: request.items.as_deref().map(to_new_line_items),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sales order not found")))?;

    let items = state.db.get_sales_order_items(order_id).await?;

    Ok(Json(SalesOrderResponse { order, items }))
}

#[tracing::instrument(skip(state))]
pub async fn delete_sales_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_sales_order(order_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Sales order not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
