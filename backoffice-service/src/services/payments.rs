//! Payment operations.
//!
//! A payment optionally applies against an invoice. Whenever a payment
//! that touches an invoice is written, that invoice's `paid_amount` is
//! recomputed from its completed payments in the same transaction, so
//! the stored figure never drifts from the payment set.

use crate::models::{CreatePayment, ListPaymentsFilter, Payment, PaymentStatus, UpdatePayment};
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_CREATED_TOTAL, DOCUMENT_AMOUNT_TOTAL};
use crate::services::rollup::refresh_invoice_paid_amount;
use crate::services::sequence::{allocate_number, DocumentFamily};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// Lock an invoice row and return `(customer_id, total_amount)`.
async fn lock_invoice(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> Result<(Uuid, Decimal), AppError> {
    sqlx::query_as::<_, (Uuid, Decimal)>(
        "SELECT customer_id, total_amount FROM invoices WHERE invoice_id = $1 FOR UPDATE",
    )
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))
}

/// Sum of completed payments already applied to an invoice, excluding
/// one payment (pass `Uuid::nil()` to exclude nothing).
async fn applied_amount(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    excluding: Uuid,
) -> Result<Decimal, AppError> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM payments
        WHERE invoice_id = $1 AND status = 'completed' AND payment_id <> $2
        "#,
    )
    .bind(invoice_id)
    .bind(excluding)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))
}

impl Database {
    /// Record a payment, applying it to an invoice when one is
    /// referenced. A completed payment may not exceed the invoice's
    /// outstanding balance.
    #[instrument(skip(self, input))]
    pub async fn create_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // A payment against an invoice inherits its customer when none
        // was given, and a completed one must fit the open balance.
        let mut customer_id = input.customer_id;
        if let Some(invoice_id) = input.invoice_id {
            let (invoice_customer, total_amount) = lock_invoice(&mut tx, invoice_id).await?;
            customer_id = customer_id.or(Some(invoice_customer));

            if input.status == PaymentStatus::Completed {
                let applied = applied_amount(&mut tx, invoice_id, Uuid::nil()).await?;
                if input.amount > total_amount - applied {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Payment amount {} exceeds invoice balance {}",
                        input.amount,
                        total_amount - applied
                    )));
                }
            }
        } else if let Some(customer_id) = customer_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM customers WHERE customer_id = $1)",
            )
            .bind(customer_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check customer: {}", e))
            })?;
            if !exists {
                return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
            }
        }

        let payment_number = allocate_number(&mut tx, DocumentFamily::Payment).await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                payment_id, payment_number, customer_id, invoice_id, amount,
                method, status, payment_date, reference, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING payment_id, payment_number, customer_id, invoice_id, amount,
                method, status, payment_date, reference, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&payment_number)
        .bind(customer_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(input.method.as_str())
        .bind(input.status.as_str())
        .bind(input.payment_date)
        .bind(&input.reference)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create payment: {}", e)))?;

        if let Some(invoice_id) = input.invoice_id {
            refresh_invoice_paid_amount(&mut tx, invoice_id).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        DOCUMENTS_CREATED_TOTAL
            .with_label_values(&["payment"])
            .inc();
        if let Some(amount) = payment.amount.to_f64() {
            DOCUMENT_AMOUNT_TOTAL
                .with_label_values(&["payment"])
                .inc_by(amount);
        }

        info!(
            payment_id = %payment.payment_id,
            payment_number = %payment.payment_number,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Get a payment by ID.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, payment_number, customer_id, invoice_id, amount,
                method, status, payment_date, reference, notes, created_utc, updated_utc
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// List payments with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_payments(
        &self,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let payments = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Payment>(
                r#"
                SELECT payment_id, payment_number, customer_id, invoice_id, amount,
                    method, status, payment_date, reference, notes, created_utc, updated_utc
                FROM payments
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::uuid IS NULL OR invoice_id = $3)
                  AND ($4::date IS NULL OR payment_date >= $4)
                  AND ($5::date IS NULL OR payment_date <= $5)
                  AND payment_id > $6
                ORDER BY payment_id
                LIMIT $7
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.invoice_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Payment>(
                r#"
                SELECT payment_id, payment_number, customer_id, invoice_id, amount,
                    method, status, payment_date, reference, notes, created_utc, updated_utc
                FROM payments
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR customer_id = $2)
                  AND ($3::uuid IS NULL OR invoice_id = $3)
                  AND ($4::date IS NULL OR payment_date >= $4)
                  AND ($5::date IS NULL OR payment_date <= $5)
                ORDER BY payment_id
                LIMIT $6
                "#,
            )
            .bind(&status_str)
            .bind(filter.customer_id)
            .bind(filter.invoice_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Update a payment. Supplying `invoice_id` repoints the payment at
    /// another invoice; both the old and the new invoice get their paid
    /// amount recomputed. A payment completed against an invoice must
    /// still fit its outstanding balance.
    #[instrument(skip(self, input), fields(payment_id = %payment_id))]
    pub async fn update_payment(
        &self,
        payment_id: Uuid,
        input: &UpdatePayment,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment"])
            .start_timer();

        if let Some(amount) = input.amount {
            if amount <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Payment amount must be positive"
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, payment_number, customer_id, invoice_id, amount,
                method, status, payment_date, reference, notes, created_utc, updated_utc
            FROM payments
            WHERE payment_id = $1
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))?;

        let existing = match existing {
            Some(payment) => payment,
            None => {
                tx.rollback().await.ok();
                return Ok(None);
            }
        };

        let invoice_id = input.invoice_id.or(existing.invoice_id);
        let amount = input.amount.unwrap_or(existing.amount);
        let method = input
            .method
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| existing.method.clone());
        let status = input
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| existing.status.clone());
        let payment_date = input.payment_date.unwrap_or(existing.payment_date);
        let reference = input.reference.clone().or_else(|| existing.reference.clone());
        let notes = input.notes.clone().or_else(|| existing.notes.clone());

        if let Some(invoice_id) = invoice_id {
            let (_, total_amount) = lock_invoice(&mut tx, invoice_id).await?;

            if status == PaymentStatus::Completed.as_str() {
                let applied = applied_amount(&mut tx, invoice_id, payment_id).await?;
                if amount > total_amount - applied {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Payment amount {} exceeds invoice balance {}",
                        amount,
                        total_amount - applied
                    )));
                }
            }
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET invoice_id = $2,
                amount = $3,
                method = $4,
                status = $5,
                payment_date = $6,
                reference = $7,
                notes = $8,
                updated_utc = NOW()
            WHERE payment_id = $1
            RETURNING payment_id, payment_number, customer_id, invoice_id, amount,
                method, status, payment_date, reference, notes, created_utc, updated_utc
            "#,
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(amount)
        .bind(&method)
        .bind(&status)
        .bind(payment_date)
        .bind(&reference)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update payment: {}", e)))?;

        if let Some(old_invoice) = existing.invoice_id {
            refresh_invoice_paid_amount(&mut tx, old_invoice).await?;
        }
        if let Some(new_invoice) = invoice_id {
            if Some(new_invoice) != existing.invoice_id {
                refresh_invoice_paid_amount(&mut tx, new_invoice).await?;
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(payment_id = %payment.payment_id, status = %payment.status, "Payment updated");

        Ok(Some(payment))
    }

    /// Delete a payment, refreshing the invoice it was applied to.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT invoice_id FROM payments WHERE payment_id = $1 FOR UPDATE",
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))?;

        let invoice_id = match invoice_id {
            Some(invoice_id) => invoice_id,
            None => {
                tx.rollback().await.ok();
                return Ok(false);
            }
        };

        sqlx::query("DELETE FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e))
            })?;

        if let Some(invoice_id) = invoice_id {
            refresh_invoice_paid_amount(&mut tx, invoice_id).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(payment_id = %payment_id, "Payment deleted");

        Ok(true)
    }
}
