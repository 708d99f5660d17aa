//! Stock movement model for backoffice-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Movement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Transfer => "transfer",
        }
    }

    /// Strict parse; type strings are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(MovementType::Purchase),
            "sale" => Some(MovementType::Sale),
            "adjustment" => Some(MovementType::Adjustment),
            "return" => Some(MovementType::Return),
            "transfer" => Some(MovementType::Transfer),
            _ => None,
        }
    }
}

/// One entry in the stock ledger. `stock_before` and `stock_after` are
/// derived server-side from the product row under lock; every numeric
/// field is write-once. Only `reason` may be edited afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub movement_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub movement_type: String,
    pub quantity_change: i32,
    pub stock_before: i32,
    pub stock_after: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Filter parameters for listing stock movements.
#[derive(Debug, Clone, Default)]
pub struct ListStockMovementsFilter {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for a manual stock adjustment: the caller states the new
/// absolute quantity and the delta is derived.
#[derive(Debug, Clone)]
pub struct AdjustStock {
    pub new_quantity: i32,
    pub reason: Option<String>,
}

/// Input for recording a movement directly, e.g. a return or a
/// transfer between locations. The before/after snapshot is still
/// derived on the server, never taken from the caller.
#[derive(Debug, Clone)]
pub struct CreateStockMovement {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity_change: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
}
