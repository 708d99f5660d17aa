//! Support shared by the document families.
//!
//! Invoices, sales orders and purchase orders all carry line items that
//! snapshot the product at write time. The snapshot is taken here, in
//! the document's transaction, so a concurrent product rename cannot
//! split a document between old and new names.

use crate::models::NewLineItem;
use crate::services::totals::line_total;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// A line item resolved against the catalog, ready to insert.
#[derive(Debug, Clone)]
pub(crate) struct ItemSnapshot {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Resolve submitted line items against the product catalog. Order is
/// preserved; an unknown product or an out-of-range quantity or price
/// fails the whole document.
pub(crate) async fn snapshot_items(
    conn: &mut PgConnection,
    items: &[NewLineItem],
) -> Result<Vec<ItemSnapshot>, AppError> {
    let mut snapshots = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item quantity must be at least 1"
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item unit price cannot be negative"
            )));
        }

        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT name, sku FROM products WHERE product_id = $1",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to look up product: {}", e)))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Product {} not found", item.product_id))
        })?;

        snapshots.push(ItemSnapshot {
            product_id: item.product_id,
            product_name: row.0,
            product_sku: row.1,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: line_total(item.quantity, item.unit_price),
        });
    }

    Ok(snapshots)
}

/// Look up a customer's name for snapshotting onto a document.
pub(crate) async fn customer_name(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("SELECT name FROM customers WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to look up customer: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer {} not found", customer_id)))
}
