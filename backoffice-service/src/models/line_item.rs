//! Line item models for backoffice-service.
//!
//! Each document family has its own item table; the shapes differ only
//! in the parent key and, for purchase orders, the cost column. Items
//! snapshot the product name and SKU at write time so documents stay
//! readable after a product is renamed or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// Line item on a sales order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalesOrderItem {
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// Line item on a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrderItem {
    pub item_id: Uuid,
    pub po_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for one line item on any document family. `unit_price` is the
/// unit cost when the document is a purchase order. Position comes from
/// the item's place in the submitted list.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}
