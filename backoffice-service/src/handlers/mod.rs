//! HTTP handlers for backoffice-service.
//!
//! One module per entity; request and response shapes live next to the
//! handlers that use them. Everything here parses and validates input,
//! then hands off to the database layer.

pub mod customers;
pub mod invoices;
pub mod payments;
pub mod products;
pub mod purchase_orders;
pub mod sales_orders;
pub mod stock_movements;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::models::NewLineItem;
use crate::AppState;

/// Default page size when the caller does not send one.
pub const DEFAULT_PAGE_SIZE: i32 = 20;

/// One page of a listing. `next_page_token` is the last item's id when
/// another page may exist; pass it back as `page_token` to continue.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}

impl<T> Page<T> {
    /// Build a page, deriving the continuation token the way the
    /// listing queries page: a full page means there may be more.
    pub fn new(items: Vec<T>, page_size: i32, id_of: impl Fn(&T) -> Uuid) -> Self {
        let next_page_token = if items.len() == page_size as usize {
            items.last().map(&id_of)
        } else {
            None
        };
        Page {
            items,
            next_page_token,
        }
    }
}

/// One line item as submitted on any document. `unit_cost` is accepted
/// as an alias so purchase order payloads read naturally.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(alias = "unit_cost")]
    pub unit_price: Decimal,
}

pub(crate) fn to_new_line_items(items: &[LineItemRequest]) -> Vec<NewLineItem> {
    items
        .iter()
        .map(|item| NewLineItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect()
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "backoffice-service" })),
    )
}

/// Readiness gates on the database; a pool that cannot answer `SELECT 1`
/// means this instance should not receive traffic.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready" })),
        ),
    }
}

pub async fn metrics() -> impl IntoResponse {
    crate::services::get_metrics()
}
