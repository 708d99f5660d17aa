//! Customer operations.

use crate::models::{CreateCustomer, Customer, ListCustomersFilter, UpdateCustomer};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl Database {
    /// Create a new customer. Order stats start at zero and are only
    /// ever written by the rollup.
    #[instrument(skip(self, input))]
    pub async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer_id = Uuid::new_v4();
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (customer_id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING customer_id, name, email, phone, address, total_orders, total_spent,
                last_order_date, created_utc, updated_utc
            "#,
        )
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        timer.observe_duration();

        info!(customer_id = %customer.customer_id, "Customer created");

        Ok(customer)
    }

    /// Get a customer by ID.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, email, phone, address, total_orders, total_spent,
                last_order_date, created_utc, updated_utc
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// List customers with optional name/email search.
    #[instrument(skip(self, filter))]
    pub async fn list_customers(
        &self,
        filter: &ListCustomersFilter,
    ) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let customers = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Customer>(
                r#"
                SELECT customer_id, name, email, phone, address, total_orders, total_spent,
                    last_order_date, created_utc, updated_utc
                FROM customers
                WHERE ($1::varchar IS NULL OR name ILIKE $1 OR email ILIKE $1)
                  AND customer_id > $2
                ORDER BY customer_id
                LIMIT $3
                "#,
            )
            .bind(&search)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Customer>(
                r#"
                SELECT customer_id, name, email, phone, address, total_orders, total_spent,
                    last_order_date, created_utc, updated_utc
                FROM customers
                WHERE ($1::varchar IS NULL OR name ILIKE $1 OR email ILIKE $1)
                ORDER BY customer_id
                LIMIT $2
                "#,
            )
            .bind(&search)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Update a customer's profile fields. The stats columns are not
    /// accepted here.
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING customer_id, name, email, phone, address, total_orders, total_spent,
                last_order_date, created_utc, updated_utc
            "#,
        )
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e)))?;

        timer.observe_duration();

        if let Some(ref c) = customer {
            info!(customer_id = %c.customer_id, "Customer updated");
        }

        Ok(customer)
    }

    /// Delete a customer. Refused while invoices or sales orders still
    /// reference them; payments only lose the link.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_customer"])
            .start_timer();

        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Customer still has invoices or orders and cannot be deleted"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete customer: {}", e)),
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(customer_id = %customer_id, "Customer deleted");
        }

        Ok(deleted)
    }

    /// Recompute a customer's order stats outside any document flow.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn refresh_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["refresh_customer"])
            .start_timer();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        super::rollup::refresh_customer_stats(&mut conn, customer_id).await?;
        drop(conn);

        let customer = self.get_customer(customer_id).await?;

        timer.observe_duration();

        Ok(customer)
    }
}
