//! Stock ledger operations.
//!
//! Every change to a product's stock goes through [`apply_movement`],
//! which locks the product row, derives the before/after snapshot on
//! the server and writes the movement and the new stock level in the
//! caller's transaction. Concurrent movements against the same product
//! serialize on the row lock, so snapshots can never interleave.

use crate::models::{
    AdjustStock, CreateStockMovement, ListStockMovementsFilter, MovementType, Product,
    StockMovement,
};
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, STOCK_MOVEMENTS_TOTAL};
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// A stock change to be applied: the delta plus its classification and
/// an optional link back to the document that caused it.
#[derive(Debug, Clone)]
pub(crate) struct MovementSpec {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity_change: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
}

/// Apply one movement inside an open transaction. Fails without
/// touching anything when the product is missing, the delta is zero or
/// the result would be negative.
pub(crate) async fn apply_movement(
    conn: &mut PgConnection,
    spec: &MovementSpec,
) -> Result<StockMovement, AppError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT product_id, name, sku, description, price, cost, stock, low_stock_threshold,
            status, created_utc, updated_utc
        FROM products
        WHERE product_id = $1
        FOR UPDATE
        "#,
    )
    .bind(spec.product_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock product: {}", e)))?
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    if spec.quantity_change == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Stock movement must change the quantity"
        )));
    }

    let stock_after = product.stock + spec.quantity_change;
    if stock_after < 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Insufficient stock for {}: have {}, movement needs {}",
            product.sku,
            product.stock,
            -spec.quantity_change
        )));
    }

    sqlx::query("UPDATE products SET stock = $2, updated_utc = NOW() WHERE product_id = $1")
        .bind(spec.product_id)
        .bind(stock_after)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update stock: {}", e)))?;

    let movement_id = Uuid::new_v4();
    let movement = sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements (
            movement_id, product_id, product_name, product_sku, movement_type,
            quantity_change, stock_before, stock_after, reason, reference_id, reference_type
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING movement_id, product_id, product_name, product_sku, movement_type,
            quantity_change, stock_before, stock_after, reason, reference_id, reference_type,
            created_utc
        "#,
    )
    .bind(movement_id)
    .bind(spec.product_id)
    .bind(&product.name)
    .bind(&product.sku)
    .bind(spec.movement_type.as_str())
    .bind(spec.quantity_change)
    .bind(product.stock)
    .bind(stock_after)
    .bind(&spec.reason)
    .bind(spec.reference_id)
    .bind(&spec.reference_type)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record movement: {}", e)))?;

    STOCK_MOVEMENTS_TOTAL
        .with_label_values(&[spec.movement_type.as_str()])
        .inc();

    Ok(movement)
}

impl Database {
    /// Record a stock movement by its signed delta, e.g. a return
    /// coming back in or a transfer going out.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn record_stock_movement(
        &self,
        input: &CreateStockMovement,
    ) -> Result<StockMovement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_stock_movement"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let movement = apply_movement(
            &mut tx,
            &MovementSpec {
                product_id: input.product_id,
                movement_type: input.movement_type,
                quantity_change: input.quantity_change,
                reason: input.reason.clone(),
                reference_id: input.reference_id,
                reference_type: input.reference_type.clone(),
            },
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            movement_id = %movement.movement_id,
            movement_type = %input.movement_type.as_str(),
            quantity_change = movement.quantity_change,
            stock_after = movement.stock_after,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    /// Record a manual stock adjustment to an absolute quantity.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn record_adjustment(
        &self,
        product_id: Uuid,
        input: &AdjustStock,
    ) -> Result<StockMovement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_adjustment"])
            .start_timer();

        if input.new_quantity < 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Stock cannot be negative"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let current = sqlx::query_scalar::<_, i32>(
            "SELECT stock FROM products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock product: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        if input.new_quantity == current {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Stock is already at {}",
                current
            )));
        }

        let movement = apply_movement(
            &mut tx,
            &MovementSpec {
                product_id,
                movement_type: MovementType::Adjustment,
                quantity_change: input.new_quantity - current,
                reason: input.reason.clone(),
                reference_id: None,
                reference_type: None,
            },
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            movement_id = %movement.movement_id,
            quantity_change = movement.quantity_change,
            stock_after = movement.stock_after,
            "Stock adjusted"
        );

        Ok(movement)
    }

    /// Get a stock movement by ID.
    #[instrument(skip(self), fields(movement_id = %movement_id))]
    pub async fn get_stock_movement(
        &self,
        movement_id: Uuid,
    ) -> Result<Option<StockMovement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_stock_movement"])
            .start_timer();

        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT movement_id, product_id, product_name, product_sku, movement_type,
                quantity_change, stock_before, stock_after, reason, reference_id, reference_type,
                created_utc
            FROM stock_movements
            WHERE movement_id = $1
            "#,
        )
        .bind(movement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get movement: {}", e)))?;

        timer.observe_duration();

        Ok(movement)
    }

    /// List stock movements with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_stock_movements(
        &self,
        filter: &ListStockMovementsFilter,
    ) -> Result<Vec<StockMovement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_stock_movements"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let type_str = filter.movement_type.map(|t| t.as_str().to_string());

        let movements = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, StockMovement>(
                r#"
                SELECT movement_id, product_id, product_name, product_sku, movement_type,
                    quantity_change, stock_before, stock_after, reason, reference_id,
                    reference_type, created_utc
                FROM stock_movements
                WHERE ($1::uuid IS NULL OR product_id = $1)
                  AND ($2::varchar IS NULL OR movement_type = $2)
                  AND movement_id > $3
                ORDER BY movement_id
                LIMIT $4
                "#,
            )
            .bind(filter.product_id)
            .bind(&type_str)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, StockMovement>(
                r#"
                SELECT movement_id, product_id, product_name, product_sku, movement_type,
                    quantity_change, stock_before, stock_after, reason, reference_id,
                    reference_type, created_utc
                FROM stock_movements
                WHERE ($1::uuid IS NULL OR product_id = $1)
                  AND ($2::varchar IS NULL OR movement_type = $2)
                ORDER BY movement_id
                LIMIT $3
                "#,
            )
            .bind(filter.product_id)
            .bind(&type_str)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list movements: {}", e)))?;

        timer.observe_duration();

        Ok(movements)
    }

    /// Update the free-text reason on a movement. The numeric fields
    /// are write-once and stay untouched.
    #[instrument(skip(self, reason), fields(movement_id = %movement_id))]
    pub async fn update_movement_reason(
        &self,
        movement_id: Uuid,
        reason: &str,
    ) -> Result<Option<StockMovement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_movement_reason"])
            .start_timer();

        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            UPDATE stock_movements
            SET reason = $2
            WHERE movement_id = $1
            RETURNING movement_id, product_id, product_name, product_sku, movement_type,
                quantity_change, stock_before, stock_after, reason, reference_id, reference_type,
                created_utc
            "#,
        )
        .bind(movement_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update movement reason: {}", e))
        })?;

        timer.observe_duration();

        Ok(movement)
    }
}
