//! Product catalog endpoints, including manual stock adjustments and
//! the low-stock report.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{Page, DEFAULT_PAGE_SIZE};
use crate::models::{
    AdjustStock, CreateProduct, ListProductsFilter, LowStockProduct, Product, ProductStatus,
    StockMovement, UpdateProduct,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub low_stock_threshold: i32,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub low_stock_threshold: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub new_quantity: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

fn parse_status(s: &str) -> Result<ProductStatus, AppError> {
    ProductStatus::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown product status '{}'", s)))
}

fn check_money(label: &str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} cannot be negative",
            label
        )));
    }
    Ok(())
}

#[tracing::instrument(skip(state, request))]
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    request.validate()?;
    check_money("Price", request.price)?;
    check_money("Cost", request.cost)?;
    if request.stock < 0 || request.low_stock_threshold < 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Stock and threshold cannot be negative"
        )));
    }

    let status = match request.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => ProductStatus::Active,
    };

    let product = state
        .db
        .create_product(&CreateProduct {
            name: request.name,
            sku: request.sku,
            description: request.description,
            price: request.price,
            cost: request.cost,
            stock: request.stock,
            low_stock_threshold: request.low_stock_threshold,
            status,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

#[tracing::instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Page<Product>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let products = state
        .db
        .list_products(&ListProductsFilter {
            status,
            search: query.search,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(products, page_size, |p| p.product_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    request.validate()?;
    if let Some(price) = request.price {
        check_money("Price", price)?;
    }
    if let Some(cost) = request.cost {
        check_money("Cost", cost)?;
    }
    if matches!(request.low_stock_threshold, Some(t) if t < 0) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Threshold cannot be negative"
        )));
    }

    let status = request.status.as_deref().map(parse_status).transpose()?;

    let product = state
        .db
        .update_product(
            product_id,
            &UpdateProduct {
                name: request.name,
                sku: request.sku,
                description: request.description,
                price: request.price,
                cost: request.cost,
                low_stock_threshold: request.low_stock_threshold,
                status,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

#[tracing::instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_product(product_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Set a product's stock to an absolute quantity; the ledger records
/// the derived delta as an adjustment movement.
#[tracing::instrument(skip(state, request))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<(StatusCode, Json<StockMovement>), AppError> {
    request.validate()?;

    let movement = state
        .db
        .record_adjustment(
            product_id,
            &AdjustStock {
                new_quantity: request.new_quantity,
                reason: request.reason,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

#[tracing::instrument(skip(state))]
pub async fn low_stock_report(
    State(state): State<AppState>,
) -> Result<Json<Vec<LowStockProduct>>, AppError> {
    let products = state.db.low_stock_report().await?;
    Ok(Json(products))
}
