//! Purchase order operations.
//!
//! Same shape as sales orders but pointed the other way: suppliers are
//! free text rather than a managed entity, line items carry a unit
//! cost, and the first time an order enters `received` a purchase
//! movement per line increments stock. The ledger is the received-once
//! record.

use crate::models::{
    CreatePurchaseOrder, ListPurchaseOrdersFilter, MovementType, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus, UpdatePurchaseOrder,
};
use crate::services::database::Database;
use crate::services::documents::{snapshot_items, ItemSnapshot};
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_CREATED_TOTAL, DOCUMENT_AMOUNT_TOTAL};
use crate::services::sequence::{allocate_number, DocumentFamily};
use crate::services::stock::{apply_movement, MovementSpec};
use crate::services::totals::DocumentTotals;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

async fn insert_po_items(
    conn: &mut PgConnection,
    po_id: Uuid,
    items: &[ItemSnapshot],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                item_id, po_id, product_id, product_name, product_sku,
                quantity, unit_cost, total, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(po_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_sku)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total)
        .bind(position as i32)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
        })?;
    }

    Ok(())
}

/// Whether this order has already produced purchase movements.
/// Receiving is a once-only event; the ledger is the record of it, not
/// the status.
async fn already_received(conn: &mut PgConnection, po_id: Uuid) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM stock_movements
            WHERE reference_id = $1 AND reference_type = 'purchase_order'
        )
        "#,
    )
    .bind(po_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check receipts: {}", e)))
}

/// Record a purchase movement per line. Lines whose product has since
/// been deleted keep their snapshot but have no stock to move.
async fn receive_po_items(
    conn: &mut PgConnection,
    po_id: Uuid,
    po_number: &str,
) -> Result<(), AppError> {
    let lines = sqlx::query_as::<_, (Option<Uuid>, i32)>(
        "SELECT product_id, quantity FROM purchase_order_items WHERE po_id = $1 ORDER BY position",
    )
    .bind(po_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read line items: {}", e)))?;

    for (product_id, quantity) in lines {
        let Some(product_id) = product_id else {
            continue;
        };

        apply_movement(
            conn,
            &MovementSpec {
                product_id,
                movement_type: MovementType::Purchase,
                quantity_change: quantity,
                reason: Some(format!("Purchase order {} received", po_number)),
                reference_id: Some(po_id),
                reference_type: Some("purchase_order".to_string()),
            },
        )
        .await?;
    }

    Ok(())
}

impl Database {
    /// Create a purchase order with its line items. An order created
    /// directly in `received` status is received immediately.
    #[instrument(skip(self, input), fields(supplier = %input.supplier_name))]
    pub async fn create_purchase_order(
        &self,
        input: &CreatePurchaseOrder,
    ) -> Result<PurchaseOrder, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_purchase_order"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Purchase order must have at least one line item"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let items = snapshot_items(&mut tx, &input.items).await?;
        let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
        let totals = DocumentTotals::compute(&line_totals, input.tax_rate);
        let po_number = allocate_number(&mut tx, DocumentFamily::PurchaseOrder).await?;

        let po_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (
                po_id, po_number, supplier_name, status,
                order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING po_id, po_number, supplier_name, status,
                order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            "#,
        )
        .bind(po_id)
        .bind(&po_number)
        .bind(&input.supplier_name)
        .bind(input.status.as_str())
        .bind(input.order_date)
        .bind(input.expected_date)
        .bind(totals.subtotal)
        .bind(input.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create purchase order: {}", e))
        })?;

        insert_po_items(&mut tx, po_id, &items).await?;

        if input.status == PurchaseOrderStatus::Received {
            receive_po_items(&mut tx, po_id, &po_number).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        DOCUMENTS_CREATED_TOTAL
            .with_label_values(&["purchase_order"])
            .inc();
        if let Some(amount) = order.total_amount.to_f64() {
            DOCUMENT_AMOUNT_TOTAL
                .with_label_values(&["purchase_order"])
                .inc_by(amount);
        }

        info!(
            po_id = %order.po_id,
            po_number = %order.po_number,
            "Purchase order created"
        );

        Ok(order)
    }

    /// Get a purchase order by ID.
    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn get_purchase_order(&self, po_id: Uuid) -> Result<Option<PurchaseOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_purchase_order"])
            .start_timer();

        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT po_id, po_number, supplier_name, status,
                order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            FROM purchase_orders
            WHERE po_id = $1
            "#,
        )
        .bind(po_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get purchase order: {}", e))
        })?;

        timer.observe_duration();

        Ok(order)
    }

    /// Get a purchase order's line items in document order.
    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn get_purchase_order_items(
        &self,
        po_id: Uuid,
    ) -> Result<Vec<PurchaseOrderItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_purchase_order_items"])
            .start_timer();

        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT item_id, po_id, product_id, product_name, product_sku,
                quantity, unit_cost, total, position, created_utc
            FROM purchase_order_items
            WHERE po_id = $1
            ORDER BY position, created_utc
            "#,
        )
        .bind(po_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// List purchase orders with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_purchase_orders(
        &self,
        filter: &ListPurchaseOrdersFilter,
    ) -> Result<Vec<PurchaseOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_purchase_orders"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let orders = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, PurchaseOrder>(
                r#"
                SELECT po_id, po_number, supplier_name, status,
                    order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                    notes, created_utc, updated_utc
                FROM purchase_orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::date IS NULL OR order_date >= $2)
                  AND ($3::date IS NULL OR order_date <= $3)
                  AND po_id > $4
                ORDER BY po_id
                LIMIT $5
                "#,
            )
            .bind(&status_str)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, PurchaseOrder>(
                r#"
                SELECT po_id, po_number, supplier_name, status,
                    order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                    notes, created_utc, updated_utc
                FROM purchase_orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::date IS NULL OR order_date >= $2)
                  AND ($3::date IS NULL OR order_date <= $3)
                ORDER BY po_id
                LIMIT $4
                "#,
            )
            .bind(&status_str)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list purchase orders: {}", e))
        })?;

        timer.observe_duration();

        Ok(orders)
    }

    /// Update a purchase order. A submitted item list replaces the
    /// stored one wholesale; totals are recomputed whenever items or
    /// the tax rate arrive. Moving into `received` books the final item
    /// set into stock, at most once per order.
    #[instrument(skip(self, input), fields(po_id = %po_id))]
    pub async fn update_purchase_order(
        &self,
        po_id: Uuid,
        input: &UpdatePurchaseOrder,
    ) -> Result<Option<PurchaseOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_purchase_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT po_id, po_number, supplier_name, status,
                order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            FROM purchase_orders
            WHERE po_id = $1
            FOR UPDATE
            "#,
        )
        .bind(po_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to lock purchase order: {}", e))
        })?;

        let existing = match existing {
            Some(order) => order,
            None => {
                tx.rollback().await.ok();
                return Ok(None);
            }
        };

        let supplier_name = input
            .supplier_name
            .clone()
            .unwrap_or_else(|| existing.supplier_name.clone());
        let status = input
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| existing.status.clone());
        let order_date = input.order_date.unwrap_or(existing.order_date);
        let expected_date = input.expected_date.or(existing.expected_date);
        let tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);
        let notes = input.notes.clone().or_else(|| existing.notes.clone());

        let totals = if let Some(ref new_items) = input.items {
            let items = snapshot_items(&mut tx, new_items).await?;

            sqlx::query("DELETE FROM purchase_order_items WHERE po_id = $1")
                .bind(po_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace line items: {}", e))
                })?;
            insert_po_items(&mut tx, po_id, &items).await?;

            let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
            DocumentTotals::compute(&line_totals, tax_rate)
        } else if input.tax_rate.is_some() {
            let line_totals = sqlx::query_scalar::<_, Decimal>(
                "SELECT total FROM purchase_order_items WHERE po_id = $1 ORDER BY position",
            )
            .bind(po_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to read line items: {}", e))
            })?;
            DocumentTotals::compute(&line_totals, tax_rate)
        } else {
            DocumentTotals {
                subtotal: existing.subtotal,
                tax_amount: existing.tax_amount,
                total_amount: existing.total_amount,
            }
        };

        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders
            SET supplier_name = $2,
                status = $3,
                order_date = $4,
                expected_date = $5,
                tax_rate = $6,
                subtotal = $7,
                tax_amount = $8,
                total_amount = $9,
                notes = $10,
                updated_utc = NOW()
            WHERE po_id = $1
            RETURNING po_id, po_number, supplier_name, status,
                order_date, expected_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            "#,
        )
        .bind(po_id)
        .bind(&supplier_name)
        .bind(&status)
        .bind(order_date)
        .bind(expected_date)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update purchase order: {}", e))
        })?;

        if status == PurchaseOrderStatus::Received.as_str()
            && existing.status != PurchaseOrderStatus::Received.as_str()
            && !already_received(&mut tx, po_id).await?
        {
            receive_po_items(&mut tx, po_id, &existing.po_number).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(po_id = %order.po_id, status = %order.status, "Purchase order updated");

        Ok(Some(order))
    }

    /// Delete a purchase order and its line items. Ledger entries the
    /// order produced stay.
    #[instrument(skip(self), fields(po_id = %po_id))]
    pub async fn delete_purchase_order(&self, po_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_purchase_order"])
            .start_timer();

        let result = sqlx::query("DELETE FROM purchase_orders WHERE po_id = $1")
            .bind(po_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete purchase order: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(po_id = %po_id, "Purchase order deleted");
        }

        Ok(deleted)
    }
}
