//! Customer model for backoffice-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer record. `total_orders`, `total_spent` and `last_order_date`
/// are maintained by the rollup and are always recomputable from the
/// customer's invoices; they are never accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub total_orders: i32,
    pub total_spent: Decimal,
    pub last_order_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing customers.
#[derive(Debug, Clone, Default)]
pub struct ListCustomersFilter {
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Input for updating a customer.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
