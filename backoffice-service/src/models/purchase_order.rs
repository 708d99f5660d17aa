//! Purchase order model for backoffice-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::NewLineItem;

/// Purchase order status. A narrower set than sales orders use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Strict parse; status strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "sent" => Some(PurchaseOrderStatus::Sent),
            "received" => Some(PurchaseOrderStatus::Received),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Purchase order document. Suppliers are free text, not a managed
/// entity. Entering `received` for the first time records a purchase
/// movement per line and increments stock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub po_id: Uuid,
    pub po_number: String,
    pub supplier_name: String,
    pub status: String,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing purchase orders.
#[derive(Debug, Clone, Default)]
pub struct ListPurchaseOrdersFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a purchase order with its line items. Item
/// `unit_price` is read as the unit cost.
#[derive(Debug, Clone)]
pub struct CreatePurchaseOrder {
    pub supplier_name: String,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Input for updating a purchase order. When `items` is present the
/// existing line item set is replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdatePurchaseOrder {
    pub supplier_name: Option<String>,
    pub status: Option<PurchaseOrderStatus>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<NewLineItem>>,
}
