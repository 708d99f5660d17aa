//! Sales order operations.
//!
//! Orders follow the invoice shape: header plus line items written in
//! one transaction, totals derived from the lines. The extra wrinkle is
//! shipping: the first time an order enters `shipped`, a sale movement
//! per line leaves the stock ledger in the same transaction as the
//! status write. The ledger itself is the shipped-once record, so a
//! cancel and re-ship cannot deduct twice.

use crate::models::{
    CreateSalesOrder, ListSalesOrdersFilter, MovementType, SalesOrder, SalesOrderItem,
    SalesOrderStatus, UpdateSalesOrder,
};
use crate::services::database::Database;
use crate::services::documents::{customer_name, snapshot_items, ItemSnapshot};
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

async fn insert_order_items(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[ItemSnapshot],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sales_order_items (
                item_id, order_id, product_id, product_name, product_sku,
                quantity, unit_price, total, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
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

/// Whether this order has already produced sale movements. Shipping is
/// a once-only event; the ledger is the record of it, not the status,
/// so an order that bounces through cancelled and back cannot ship
/// twice.
async fn already_shipped(conn: &mut PgConnection, order_id: Uuid) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM stock_movements
            WHERE reference_id = $1 AND reference_type = 'sales_order'
        )
        "#,
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check shipments: {}", e)))
}

/// Record a sale movement per line. Lines whose product has since been
/// deleted keep their snapshot but have no stock to move.
async fn ship_order_items(
    conn: &mut PgConnection,
    order_id: Uuid,
    order_number: &str,
) -> Result<(), AppError> {
    let lines = sqlx::query_as::<_, (Option<Uuid>, i32)>(
        "SELECT product_id, quantity FROM sales_order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
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
                movement_type: MovementType::Sale,
                quantity_change: -quantity,
                reason: Some(format!("Sales order {} shipped", order_number)),
                reference_id: Some(order_id),
                reference_type: Some("sales_order".to_string()),
            },
        )
        .await?;
    }

    Ok(())
}

impl Database {
    /// Create a sales order with its line items. An order created
    /// directly in `shipped` status ships immediately.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_sales_order(
        &self,
        input: &CreateSalesOrder,
    ) -> Result<SalesOrder, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_sales_order"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Sales order must have at least one line item"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let name = customer_name(&mut tx, input.customer_id).await?;
        let items = snapshot_items(&mut tx, &input.items).await?;
        let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
        let totals = DocumentTotals::compute(&line_totals, input.tax_rate);
        let order_number = allocate_number(&mut tx, DocumentFamily::SalesOrder).await?;

        let order_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, SalesOrder>(
            r#"
            INSERT INTO sales_orders (
                order_id, order_number, customer_id, customer_name, status,
                order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING order_id, order_number, customer_id, customer_name, status,
                order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            "#,
        )
        .bind(order_id)
        .bind(&order_number)
        .bind(input.customer_id)
        .bind(&name)
        .bind(input.status.as_str())
        .bind(input.order_date)
        .bind(input.delivery_date)
        .bind(totals.subtotal)
        .bind(input.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create sales order: {}", e))
        })?;

        insert_order_items(&mut tx, order_id, &items).await?;

        if input.status == SalesOrderStatus::Shipped {
            ship_order_items(&mut tx, order_id, &order_number).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        DOCUMENTS_CREATED_TOTAL
            .with_label_values(&["sales_order"])
            .inc();
        if let Some(amount) = order.total_amount.to_f64() {
            DOCUMENT_AMOUNT_TOTAL
                .with_label_values(&["sales_order"])
                .inc_by(amount);
        }

        info!(
            order_id = %order.order_id,
            order_number = %order.order_number,
            "Sales order created"
        );

        Ok(order)
    }

    /// Get a sales order by ID.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_sales_order(&self, order_id: Uuid) -> Result<Option<SalesOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_sales_order"])
            .start_timer();

        let order = sqlx::query_as::<_, SalesOrder>(
            r#"
            SELECT order_id, order_number, customer_id, customer_name, status,
                order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            FROM sales_orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get sales order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }

    /// Get a sales order's line items in document order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_sales_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<SalesOrderItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_sales_order_items"])
            .start_timer();

        let items = sqlx::query_as::<_, SalesOrderItem>(
            r#"
            SELECT item_id, order_id, product_id, product_name, product_sku,
                quantity, unit_price, total, position, created_utc
            FROM sales_order_items
            WHERE order_id = $1
            ORDER BY position, created_utc
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// List sales orders with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_sales_orders(
        &self,
        filter: &ListSalesOrdersFilter,
    ) -> Result<Vec<SalesOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_sales_orders"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let orders = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, SalesOrder>(
                r#"
                SELECT order_id, order_number, customer_id, customer_name, status,
                    order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                    notes, created_utc, updated_utc
                FROM sales_orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::date IS NULL OR order_date >= $3)
                  AND ($4::date IS NULL OR order_date <= $4)
                  AND order_id > $5
                ORDER BY order_id
                LIMIT $6
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, SalesOrder>(
                r#"
                SELECT order_id, order_number, customer_id, customer_name, status,
                    order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                    notes, created_utc, updated_utc
                FROM sales_orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::date IS NULL OR order_date >= $3)
                  AND ($4::date IS NULL OR order_date <= $4)
                ORDER BY order_id
                LIMIT $5
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list sales orders: {}", e))
        })?;

        timer.observe_duration();

        Ok(orders)
    }

    /// Update a sales order. A submitted item list replaces the stored
    /// one wholesale; totals are recomputed whenever items or the tax
    /// rate arrive. Moving into `shipped` ships the final item set, at
    /// most once per order; insufficient stock fails the whole update.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn update_sales_order(
        &self,
        order_id: Uuid,
        input: &UpdateSalesOrder,
    ) -> Result<Option<SalesOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_sales_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, SalesOrder>(
            r#"
            SELECT order_id, order_number, customer_id, customer_name, status,
                order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            FROM sales_orders
            WHERE order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock sales order: {}", e)))?;

        let existing = match existing {
            Some(order) => order,
            None => {
                tx.rollback().await.ok();
                return Ok(None);
            }
        };

        let customer_id = input.customer_id.unwrap_or(existing.customer_id);
        let name = if customer_id != existing.customer_id {
            customer_name(&mut tx, customer_id).await?
        } else {
            existing.customer_name.clone()
        };

        let status = input
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| existing.status.clone());
        let order_date = input.order_date.unwrap_or(existing.order_date);
        let delivery_date = input.delivery_date.or(existing.delivery_date);
        let tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);
        let notes = input.notes.clone().or_else(|| existing.notes.clone());

        let totals = if let Some(ref new_items) = input.items {
            let items = snapshot_items(&mut tx, new_items).await?;

            sqlx::query("DELETE FROM sales_order_items WHERE order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace line items: {}", e))
                })?;
            insert_order_items(&mut tx, order_id, &items).await?;

            let line_totals: Vec<Decimal> = items.iter().map(|i| i.total).collect();
            DocumentTotals::compute(&line_totals, tax_rate)
        } else if input.tax_rate.is_some() {
            let line_totals = sqlx::query_scalar::<_, Decimal>(
                "SELECT total FROM sales_order_items WHERE order_id = $1 ORDER BY position",
            )
            .bind(order_id)
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

        let order = sqlx::query_as::<_, SalesOrder>(
            r#"
            UPDATE sales_orders
            SET customer_id = $2,
                customer_name = $3,
                status = $4,
                order_date = $5,
                delivery_date = $6,
                tax_rate = $7,
                subtotal = $8,
                tax_amount = $9,
                total_amount = $10,
                notes = $11,
                updated_utc = NOW()
            WHERE order_id = $1
            RETURNING order_id, order_number, customer_id, customer_name, status,
                order_date, delivery_date, subtotal, tax_rate, tax_amount, total_amount,
                notes, created_utc, updated_utc
            "#,
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(&name)
        .bind(&status)
        .bind(order_date)
        .bind(delivery_date)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update sales order: {}", e))
        })?;

        if status == SalesOrderStatus::Shipped.as_str()
            && existing.status != SalesOrderStatus::Shipped.as_str()
            && !already_shipped(&mut tx, order_id).await?
        {
            ship_order_items(&mut tx, order_id, &existing.order_number).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(order_id = %order.order_id, status = %order.status, "Sales order updated");

        Ok(Some(order))
    }

    /// Delete a sales order and its line items. Ledger entries the
    /// order produced stay; a shipped order that comes back is recorded
    /// as a return, not by deleting history.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_sales_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_sales_order"])
            .start_timer();

        let result = sqlx::query("DELETE FROM sales_orders WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete sales order: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(order_id = %order_id, "Sales order deleted");
        }

        Ok(deleted)
    }
}
