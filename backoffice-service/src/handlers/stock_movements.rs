//! Stock ledger endpoints. Movements are append-only; the one PATCH
//! touches nothing but the free-text reason.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{Page, DEFAULT_PAGE_SIZE};
use crate::models::{CreateStockMovement, ListStockMovementsFilter, MovementType, StockMovement};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockMovementRequest {
    pub product_id: Uuid,
    pub movement_type: String,
    pub quantity_change: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReasonRequest {
    #[validate(length(min = 1, message = "Reason cannot be empty"))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListStockMovementsQuery {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

fn parse_movement_type(s: &str) -> Result<MovementType, AppError> {
    MovementType::parse(s)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown movement type '{}'", s)))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_stock_movement(
    State(state): State<AppState>,
    Json(request): Json<CreateStockMovementRequest>,
) -> Result<(StatusCode, Json<StockMovement>), AppError> {
    request.validate()?;

    let movement_type = parse_movement_type(&request.movement_type)?;

    let movement = state
        .db
        .record_stock_movement(&CreateStockMovement {
            product_id: request.product_id,
            movement_type,
            quantity_change: request.quantity_change,
            reason: request.reason,
            reference_id: request.reference_id,
            reference_type: request.reference_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

#[tracing::instrument(skip(state))]
pub async fn get_stock_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<StockMovement>, AppError> {
    let movement = state
        .db
        .get_stock_movement(movement_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Stock movement not found")))?;

    Ok(Json(movement))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_stock_movements(
    State(state): State<AppState>,
    Query(query): Query<ListStockMovementsQuery>,
) -> Result<Json<Page<StockMovement>>, AppError> {
    let movement_type = query
        .movement_type
        .as_deref()
        .map(parse_movement_type)
        .transpose()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let movements = state
        .db
        .list_stock_movements(&ListStockMovementsFilter {
            product_id: query.product_id,
            movement_type,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(movements, page_size, |m| m.movement_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_movement_reason(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
    Json(request): Json<UpdateReasonRequest>,
) -> Result<Json<StockMovement>, AppError> {
    request.validate()?;

    let movement = state
        .db
        .update_movement_reason(movement_id, &request.reason)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Stock movement not found")))?;

    Ok(Json(movement))
}
