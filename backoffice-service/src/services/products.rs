//! Product catalog operations.

use crate::models::{CreateProduct, ListProductsFilter, LowStockProduct, Product, UpdateProduct};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Create a new product.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                product_id, name, sku, description, price, cost, stock,
                low_stock_threshold, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING product_id, name, sku, description, price, cost, stock,
                low_stock_threshold, status, created_utc, updated_utc
            "#,
        )
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.cost)
        .bind(input.stock)
        .bind(input.low_stock_threshold)
        .bind(input.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("SKU '{}' already exists", input.sku))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)),
        })?;

        timer.observe_duration();

        info!(product_id = %product.product_id, sku = %product.sku, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, sku, description, price, cost, stock,
                low_stock_threshold, status, created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let products = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, name, sku, description, price, cost, stock,
                    low_stock_threshold, status, created_utc, updated_utc
                FROM products
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::varchar IS NULL OR name ILIKE $2 OR sku ILIKE $2)
                  AND product_id > $3
                ORDER BY product_id
                LIMIT $4
                "#,
            )
            .bind(&status_str)
            .bind(&search)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, name, sku, description, price, cost, stock,
                    low_stock_threshold, status, created_utc, updated_utc
                FROM products
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::varchar IS NULL OR name ILIKE $2 OR sku ILIKE $2)
                ORDER BY product_id
                LIMIT $3
                "#,
            )
            .bind(&status_str)
            .bind(&search)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product. Stock is not touchable here; adjustments go
    /// through the stock ledger.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let status_str = input.status.map(|s| s.as_str().to_string());

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                sku = COALESCE($3, sku),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                cost = COALESCE($6, cost),
                low_stock_threshold = COALESCE($7, low_stock_threshold),
                status = COALESCE($8, status),
                updated_utc = NOW()
            WHERE product_id = $1
            RETURNING product_id, name, sku, description, price, cost, stock,
                low_stock_threshold, status, created_utc, updated_utc
            "#,
        )
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.cost)
        .bind(input.low_stock_threshold)
        .bind(&status_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("SKU already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)),
        })?;

        timer.observe_duration();

        if let Some(ref p) = product {
            info!(product_id = %p.product_id, "Product updated");
        }

        Ok(product)
    }

    /// Delete a product. Line items and movements that reference it
    /// keep their snapshots and lose only the link.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete product: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(product_id = %product_id, "Product deleted");
        }

        Ok(deleted)
    }

    /// Products at or below their low-stock threshold, most depleted
    /// relative to the threshold first. A zero threshold cannot form a
    /// ratio; those rows sort last.
    #[instrument(skip(self))]
    pub async fn low_stock_report(&self) -> Result<Vec<LowStockProduct>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["low_stock_report"])
            .start_timer();

        let products = sqlx::query_as::<_, LowStockProduct>(
            r#"
            SELECT product_id, name, sku, stock, low_stock_threshold
            FROM products
            WHERE stock <= low_stock_threshold
            ORDER BY stock::numeric / NULLIF(low_stock_threshold, 0) ASC NULLS LAST, sku
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to build low stock report: {}", e))
        })?;

        timer.observe_duration();

        Ok(products)
    }
}
