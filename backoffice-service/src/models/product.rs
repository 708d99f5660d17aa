//! Product model for backoffice-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Product status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }

    /// Strict parse; status strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "inactive" => Some(ProductStatus::Inactive),
            "out_of_stock" => Some(ProductStatus::OutOfStock),
            _ => None,
        }
    }
}

/// Catalog entry. `stock` is only ever written through the stock
/// movement ledger, never patched directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Row of the low-stock report: products at or below their threshold,
/// most depleted (relative to threshold) first.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LowStockProduct {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub stock: i32,
    pub low_stock_threshold: i32,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub status: Option<ProductStatus>,
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub status: ProductStatus,
}

/// Input for updating a product. `stock` is deliberately absent; use a
/// stock adjustment instead.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub low_stock_threshold: Option<i32>,
    pub status: Option<ProductStatus>,
}
