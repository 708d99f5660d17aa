//! Sales order model for backoffice-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::NewLineItem;

/// Sales order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Draft => "draft",
            SalesOrderStatus::Pending => "pending",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::Shipped => "shipped",
            SalesOrderStatus::Delivered => "delivered",
            SalesOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Strict parse; status strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(SalesOrderStatus::Draft),
            "pending" => Some(SalesOrderStatus::Pending),
            "confirmed" => Some(SalesOrderStatus::Confirmed),
            "shipped" => Some(SalesOrderStatus::Shipped),
            "delivered" => Some(SalesOrderStatus::Delivered),
            "cancelled" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Sales order document. Entering `shipped` for the first time records
/// a sale movement per line and decrements stock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalesOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status: String,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing sales orders.
#[derive(Debug, Clone, Default)]
pub struct ListSalesOrdersFilter {
    pub status: Option<SalesOrderStatus>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a sales order with its line items.
#[derive(Debug, Clone)]
pub struct CreateSalesOrder {
    pub customer_id: Uuid,
    pub status: SalesOrderStatus,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Input for updating a sales order. When `items` is present the
/// existing line item set is replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdateSalesOrder {
    pub customer_id: Option<Uuid>,
    pub status: Option<SalesOrderStatus>,
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<NewLineItem>>,
}
